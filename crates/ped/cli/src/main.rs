//! Developer tool for PIN blocks, work keys and DUKPT sequences
//!
//! Every command runs against the in-memory software co-processor.

use clap::{Parser, Subcommand};

mod commands;
mod display;

use commands::*;

#[derive(Parser)]
#[command(version, about = "Format, encipher and inspect PIN blocks")]
struct Cli {
    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a clear ISO 9564 format 0 PIN block
    PinBlock {
        #[command(flatten)]
        entry: PinArgs,
    },

    /// Encipher a PIN block under a work key loaded through a master key
    Encipher {
        /// Clear master key, hex
        #[arg(long)]
        master_key: String,

        /// Clear work key, hex; enciphered under the master key before loading
        #[arg(long)]
        work_key: String,

        /// Master key index
        #[arg(long, default_value_t = 1)]
        master_index: u32,

        /// Work key index
        #[arg(long, default_value_t = 1)]
        work_index: u32,

        #[command(flatten)]
        entry: PinArgs,
    },

    /// Walk a DUKPT key serial number sequence, enciphering a PIN at each step
    Dukpt {
        /// Base derivation key, 16 bytes hex
        #[arg(long)]
        bdk: String,

        /// Initial key serial number, 10 bytes hex
        #[arg(long)]
        ksn: String,

        /// Number of transactions to run
        #[arg(short, long, default_value_t = 1)]
        count: u32,

        #[command(flatten)]
        entry: PinArgs,
    },

    /// Check a key slot address
    Slot {
        /// Kind of key
        #[arg(value_enum)]
        kind: SlotKind,

        /// Slot index
        index: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::PinBlock { entry } => pin_block_command(&entry),
        Commands::Encipher {
            master_key,
            work_key,
            master_index,
            work_index,
            entry,
        } => encipher_command(&master_key, &work_key, master_index, work_index, &entry),
        Commands::Dukpt {
            bdk,
            ksn,
            count,
            entry,
        } => dukpt_command(&bdk, &ksn, count, &entry),
        Commands::Slot { kind, index } => slot_command(kind, index),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
