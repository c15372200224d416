//! Core types for secure PIN entry devices
//!
//! This crate provides the pieces of a PIN entry gateway that do not depend on a
//! particular keypad or co-processor:
//!
//! - Normalizing primary account numbers into ISO 9564 format 0 PAN masks
//! - Building PIN blocks for the five supported block modes
//! - Validating key slot addresses before anything reaches the device
//! - DUKPT key serial numbers
//! - The [`Coprocessor`] boundary and its request/reply model
//! - The error taxonomy and the integer outcome codes exposed to terminal applications
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::Bytes;

pub mod coprocessor;
pub mod ksn;
pub mod mode;
pub mod pan;
pub mod pin_block;
pub mod slot;
pub mod status;

mod bcd;
mod error;
pub use error::{Error, OUTCOME_SUCCESS, Result, ResultExt, outcome_code};

pub use coprocessor::{Coprocessor, Reply, Request, TransportError};
pub use ksn::Ksn;
pub use mode::{MaskLayout, PinBlockMode};
pub use pan::{NormalizedPan, PanMask};
pub use pin_block::{MAX_PIN_LEN, PinBlock};
pub use slot::{KeyKind, KeySlot, KeySlotRegistry, MasterKeyVariant};
pub use status::PedStatus;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, Coprocessor, Error, KeyKind, KeySlot, KeySlotRegistry, Ksn, PanMask, PedStatus,
        PinBlock, PinBlockMode, Reply, Request, Result, ResultExt, TransportError,
        coprocessor::{
            Chaining, CipherDirection, DukptKeyVariant, KeyMaterial, MacAlgorithm,
            PinEntryRequest, PinEvent, PinEventReceiver, PinEventSender,
        },
    };
}
