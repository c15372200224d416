//! PIN entry sessions on top of a secure co-processor
//!
//! [`PinPad`] is the gateway between a terminal application, a keypad and the
//! [`Coprocessor`](pinpad_core::Coprocessor) holding the keys. It offers:
//!
//! - Synchronous PIN capture from a polled [`Keypad`]
//! - Asynchronous PIN capture on a [`KeyboardWidget`], reported on a channel
//! - Offline PIN entry collected by the co-processor itself
//! - Master, work, DUKPT and RSA key management
//!
//! Arguments are validated before the co-processor is called. At most one
//! capture session runs per work key slot and block mode.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod capture;
pub mod config;
mod dukpt;
mod guard;
pub mod keypad;
pub mod offline;
mod pinpad;
mod rsa;

pub use capture::{
    AllowedLengths, CaptureEvent, CaptureHandle, CaptureRequest, CaptureState,
    WidgetCaptureRequest,
};
pub use config::PinPadConfig;
pub use dukpt::DukptOutput;
pub use keypad::{KeyEvent, KeyboardEvent, KeyboardListener, KeyboardWidget, Keypad, KeypadError};
pub use offline::{
    OfflineCanceller, OfflinePin, OfflinePinRequest, OfflinePinState, OfflinePinWait,
};
pub use pinpad::{PinPad, SharedCoprocessor};
pub use rsa::RsaOutput;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        AllowedLengths, CaptureEvent, CaptureRequest, KeyEvent, KeyboardEvent, KeyboardWidget,
        Keypad, OfflinePinRequest, PinPad, PinPadConfig, WidgetCaptureRequest,
    };
    pub use pinpad_core::prelude::*;
}
