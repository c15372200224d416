//! Synchronous PIN capture from a polled keypad

use std::time::Duration;

use bytes::Bytes;
use pinpad_core::{
    Coprocessor, Error, MAX_PIN_LEN, NormalizedPan, PinBlock, PinBlockMode, Result,
};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::keypad::{KeyEvent, Keypad};
use crate::pinpad::{PinPad, encipher_pin_block};

/// Parameters of a synchronous PIN capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Work key index the PIN block is enciphered under
    pub work_key: u32,
    /// PIN block mode code
    pub mode: u8,
    /// Shortest accepted PIN
    pub min_len: usize,
    /// Longest accepted PIN
    pub max_len: usize,
    /// Primary account number
    pub pan: String,
    /// Prompt shown while waiting
    pub prompt: String,
}

impl CaptureRequest {
    /// A request accepting 4 to 12 digits with the default prompt
    pub fn new(work_key: u32, mode: u8, pan: impl Into<String>) -> Self {
        Self {
            work_key,
            mode,
            min_len: 4,
            max_len: MAX_PIN_LEN,
            pan: pan.into(),
            prompt: "Enter PIN".to_owned(),
        }
    }

    /// Set the accepted length range
    pub const fn with_lengths(mut self, min: usize, max: usize) -> Self {
        self.min_len = min;
        self.max_len = max;
        self
    }

    /// Set the prompt
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    fn accepts(&self, len: usize) -> bool {
        len == 0 || (self.min_len..=self.max_len).contains(&len)
    }
}

impl<C: Coprocessor> PinPad<C> {
    /// Capture a PIN from a polled keypad and encipher it under a work key
    ///
    /// Returns the enciphered PIN block. The display is cleared on every exit.
    #[instrument(level = "debug", skip_all, fields(work_key = request.work_key, mode = request.mode))]
    pub fn capture_pin<K>(&self, keypad: &mut K, request: &CaptureRequest) -> Result<Bytes>
    where
        K: Keypad + ?Sized,
    {
        let slot = self.work_slot(request.work_key)?;
        let mode = PinBlockMode::from_code(request.mode)?;
        if request.max_len > MAX_PIN_LEN || request.min_len > request.max_len {
            return Err(Error::InvalidLengthRange {
                min: request.min_len,
                max: request.max_len,
            });
        }
        let mask = NormalizedPan::parse(&request.pan)?.mask(mode.mask_layout());
        let _guard = self.sessions.acquire(slot, mode)?;

        keypad.set_key_length(request.max_len);
        let entered = read_pin(keypad, request, self.config.key_wait);
        keypad.clear();

        let pin = entered?;
        debug!(len = pin.len(), "PIN accepted");
        let block = PinBlock::build(pin.as_bytes(), mode, &mask)?;
        encipher_pin_block(&self.ped, slot, block)
    }
}

fn read_pin<K>(keypad: &mut K, request: &CaptureRequest, wait: Duration) -> Result<Zeroizing<String>>
where
    K: Keypad + ?Sized,
{
    loop {
        keypad.clear();
        keypad.show_prompt(&request.prompt);

        match keypad.wait_key(wait) {
            KeyEvent::Enter(pin) if request.accepts(pin.len()) => return Ok(pin),
            KeyEvent::Enter(pin) => {
                debug!(len = pin.len(), "PIN length out of range, prompting again");
            }
            KeyEvent::Cancel => return Err(Error::UserCancelled),
            KeyEvent::Other(code) => {
                debug!(code, "Entry ended by another key");
                return Err(Error::InputAborted);
            }
            KeyEvent::Timeout => {
                debug!("No key within the wait interval");
                return Err(Error::InputAborted);
            }
        }
    }
}
