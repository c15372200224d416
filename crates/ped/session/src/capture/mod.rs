//! PIN capture sessions
//!
//! The synchronous capture polls a [`Keypad`](crate::Keypad) and accepts PINs
//! whose length falls in an inclusive range, re-prompting otherwise. The
//! asynchronous capture registers a listener on a
//! [`KeyboardWidget`](crate::KeyboardWidget) and only accepts lengths from an
//! explicit set; other lengths are ignored and the session keeps waiting.

mod blocking;
mod widget;

pub use blocking::CaptureRequest;
pub use widget::{CaptureEvent, CaptureHandle, CaptureState, WidgetCaptureRequest};

use pinpad_core::{Error, MAX_PIN_LEN, Result};

/// Set of PIN lengths accepted by an asynchronous entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedLengths(Vec<usize>);

impl AllowedLengths {
    /// Accept exactly the given lengths
    pub fn from_set(lengths: impl IntoIterator<Item = usize>) -> Result<Self> {
        let mut lengths: Vec<usize> = lengths.into_iter().collect();
        lengths.sort_unstable();
        lengths.dedup();

        match (lengths.first(), lengths.last()) {
            (None, _) | (_, None) => Err(Error::InvalidInput("no PIN lengths allowed")),
            (Some(&min), Some(&max)) if max > MAX_PIN_LEN => {
                Err(Error::InvalidLengthRange { min, max })
            }
            _ => Ok(Self(lengths)),
        }
    }

    /// Accept every length in `min..=max` plus the empty PIN
    ///
    /// `max` is clamped to the longest PIN and `min` to `max`.
    pub fn from_range(min: i32, max: i32) -> Result<Self> {
        if min < 0 || max < 0 {
            return Err(Error::InvalidInput("PIN length bounds must not be negative"));
        }
        let max = (max as usize).min(MAX_PIN_LEN);
        let min = (min as usize).min(max);

        Self::from_set(std::iter::once(0).chain(min..=max))
    }

    /// Whether `len` is accepted
    pub fn contains(&self, len: usize) -> bool {
        self.0.binary_search(&len).is_ok()
    }

    /// Longest accepted length
    pub fn max(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    /// Accepted lengths in ascending order
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}
