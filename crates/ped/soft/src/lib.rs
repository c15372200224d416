//! Software co-processor for PIN entry devices
//!
//! [`SoftPed`] implements the [`Coprocessor`](pinpad_core::Coprocessor) boundary
//! entirely in memory. It stores master, work, DUKPT and RSA keys, enciphers PIN
//! blocks with DES or triple DES, derives ANSI X9.24 DUKPT transaction keys and
//! replays scripted cardholder input for asynchronous PIN requests.
//!
//! It is meant for tests and developer tooling. Keys are held in process memory
//! and are not protected beyond being wiped on drop.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod crypto;
pub mod dukpt;
mod journal;
mod ped;
mod script;
pub mod status;

pub use journal::{Journal, JournalEntry};
pub use ped::{Faults, SoftPed};
pub use script::ScriptStep;
