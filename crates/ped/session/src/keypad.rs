//! Keypad and display capabilities consumed by capture sessions
//!
//! Two device shapes are supported. A [`Keypad`] is polled by the synchronous
//! capture for one key event at a time. A [`KeyboardWidget`] drives the
//! asynchronous capture and pushes [`KeyboardEvent`]s to a registered listener,
//! possibly from its own thread.

use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

/// Result of waiting for a key on a polled keypad
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    /// Enter was pressed; carries the digits typed so far
    Enter(Zeroizing<String>),
    /// Cancel was pressed
    Cancel,
    /// Some other terminating key, identified by its device key code
    Other(u32),
    /// No key arrived in time
    Timeout,
}

/// A polled keypad with a text display
pub trait Keypad {
    /// Clear the display
    fn clear(&mut self);

    /// Show a prompt
    fn show_prompt(&mut self, text: &str);

    /// Limit the number of digits the keypad accepts
    fn set_key_length(&mut self, max: usize);

    /// Wait for the next terminating key
    fn wait_key(&mut self, timeout: Duration) -> KeyEvent;
}

/// Event pushed by a keyboard widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardEvent {
    /// Enter was pressed; carries the entered digits
    Enter(Zeroizing<String>),
    /// Cancel was pressed
    Cancel,
    /// A digit key was pressed; carries the number of digits entered so far
    Key(usize),
}

/// Trait for handling keyboard widget events
pub trait KeyboardListener: Send {
    /// Handle a keyboard event
    fn handle_event(&mut self, event: KeyboardEvent);
}

impl<F> KeyboardListener for F
where
    F: FnMut(KeyboardEvent) + Send,
{
    fn handle_event(&mut self, event: KeyboardEvent) {
        self(event)
    }
}

/// Failure reported by a keyboard widget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct KeypadError(pub String);

/// An on-screen or hardware keyboard delivering events to a listener
pub trait KeyboardWidget {
    /// Limit the number of digits the widget accepts
    fn set_key_length(&mut self, max: usize);

    /// Show a prompt
    fn show_prompt(&mut self, text: &str);

    /// Register the listener receiving all further events
    fn register_listener(
        &mut self,
        listener: Box<dyn KeyboardListener>,
    ) -> Result<(), KeypadError>;
}
