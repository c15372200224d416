//! Command handlers

mod dukpt;
mod encipher;
mod pin_block;
mod slot;

pub(crate) use dukpt::dukpt_command;
pub(crate) use encipher::encipher_command;
pub(crate) use pin_block::pin_block_command;
pub(crate) use slot::{SlotKind, slot_command};

use anyhow::Context;
use clap::Args;

/// PIN, account number and block mode shared by the PIN commands
#[derive(Args, Debug, Clone)]
pub(crate) struct PinArgs {
    /// PIN digits; omit for the "no PIN" block
    #[arg(long, default_value = "")]
    pub(crate) pin: String,

    /// Primary account number; omit to disable PAN masking
    #[arg(long, default_value = "")]
    pub(crate) pan: String,

    /// PIN block mode (1 to 5)
    #[arg(long, default_value_t = 1)]
    pub(crate) mode: u8,
}

/// Decode a hex argument
pub(crate) fn parse_hex(name: &str, value: &str) -> anyhow::Result<Vec<u8>> {
    hex::decode(value.trim()).with_context(|| format!("{name} is not valid hex"))
}
