//! Events delivered by the co-processor during an asynchronous PIN request

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use zeroize::Zeroizing;

/// Event raised by the co-processor while a PIN request is pending
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinEvent {
    /// The cardholder confirmed the entry; an empty PIN means no PIN was entered
    Enter(Zeroizing<Vec<u8>>),
    /// The device reported an error
    Error {
        /// Device error code
        code: i32,
        /// Device message
        message: String,
    },
    /// The device gave up waiting for the cardholder
    Timeout,
    /// The cardholder pressed cancel
    Cancel,
    /// A key was pressed; carries the number of digits entered so far
    KeyClick(usize),
}

/// Sender for PIN events
pub type PinEventSender = Sender<PinEvent>;
/// Receiver for PIN events
pub type PinEventReceiver = Receiver<PinEvent>;

/// Create an unbounded channel for PIN events
pub fn pin_event_channel() -> (PinEventSender, PinEventReceiver) {
    unbounded()
}

/// Parameters of an asynchronous PIN request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEntryRequest {
    /// Prompt shown by the device
    pub prompt: String,
    /// Accepted PIN lengths, sorted and without duplicates
    pub allowed_lengths: Vec<usize>,
    /// How long the device waits for the cardholder
    pub timeout: Duration,
}

impl PinEntryRequest {
    /// Longest accepted PIN length
    pub fn max_len(&self) -> usize {
        self.allowed_lengths.last().copied().unwrap_or(0)
    }
}
