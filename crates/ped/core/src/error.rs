//! Core error type for all PIN entry operations
//!
//! Every public operation in the workspace returns [`Error`]. Synchronous callers
//! that need the integer view used by terminal applications call [`Error::code`]
//! or [`outcome_code`].

use crate::coprocessor::TransportError;
use crate::slot::KeyKind;
use crate::status::PedStatus;

/// Result type for PIN entry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome code reported for a successful operation
pub const OUTCOME_SUCCESS: i32 = 0;

/// Core error type that encompasses all possible failures of the gateway
#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Validation errors, raised before the co-processor is touched
    //
    /// A required argument was missing or empty
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// Minimum/maximum PIN length bounds are inconsistent
    #[error("Invalid PIN length range: min {min}, max {max}")]
    InvalidLengthRange {
        /// Requested minimum length
        min: usize,
        /// Requested maximum length
        max: usize,
    },

    /// Key slot index outside the range configured for its kind
    #[error("Invalid {kind} slot index {index}")]
    InvalidKeySlot {
        /// Kind of slot that was addressed
        kind: KeyKind,
        /// Offending index
        index: u32,
    },

    /// Unsupported PIN block mode
    #[error("Invalid PIN block mode {0}")]
    InvalidMode(u8),

    /// Primary account number has the wrong length or contains non-digits
    #[error("Invalid PAN: {0}")]
    InvalidPan(&'static str),

    /// Another capture session is already active on the same slot and mode
    #[error("A PIN entry session is already active for this key slot and mode")]
    SessionBusy,

    //
    // Boundary errors
    //
    /// The co-processor boundary was unreachable or raised a transport fault
    #[error("Communication error: {0}")]
    Communication(#[from] TransportError),

    /// The co-processor refused a valid request
    #[error("Key operation failed with status {0}")]
    KeyOperationFailed(PedStatus),

    /// The co-processor refused to start an asynchronous PIN request
    #[error("PIN request rejected with status {0}")]
    RequestRejected(PedStatus),

    /// The co-processor reported an error while a PIN request was pending
    #[error("Device error {code}: {message}")]
    DeviceError {
        /// Error code from the device
        code: i32,
        /// Message from the device
        message: String,
    },

    //
    // Session outcomes
    //
    /// The cardholder pressed cancel
    #[error("PIN entry cancelled by user")]
    UserCancelled,

    /// Entry ended on a non-terminating key or no key arrived in time
    #[error("PIN entry aborted")]
    InputAborted,

    /// The PIN request timed out
    #[error("PIN entry timed out")]
    TimedOut,

    /// Wiring the keyboard callbacks failed
    #[error("PIN entry setup failed: {0}")]
    SetupFailed(String),

    //
    // General errors
    //
    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid key slot error
    pub const fn invalid_slot(kind: KeyKind, index: u32) -> Self {
        Self::InvalidKeySlot { kind, index }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Integer outcome code for this error
    pub fn code(&self) -> i32 {
        match self {
            Self::Communication(_) => 1,
            Self::UserCancelled => 2,
            Self::InputAborted => 3,
            Self::InvalidMode(_) => 4,
            Self::InvalidKeySlot { .. } => 5,
            Self::KeyOperationFailed(_) => 6,
            Self::SetupFailed(_) => 7,
            Self::InvalidPan(_) => 8,
            Self::TimedOut => 9,
            Self::DeviceError { .. } => 10,
            Self::RequestRejected(_) => 11,
            Self::SessionBusy => 12,
            Self::InvalidLengthRange { .. } => 237,
            Self::InvalidInput(_) => 238,
            Self::Context { source, .. } => source.code(),
        }
    }

    /// Whether the error was raised before any co-processor call
    pub fn is_validation(&self) -> bool {
        matches!(
            self.root(),
            Self::InvalidInput(_)
                | Self::InvalidLengthRange { .. }
                | Self::InvalidKeySlot { .. }
                | Self::InvalidMode(_)
                | Self::InvalidPan(_)
                | Self::SessionBusy
        )
    }
}

/// Integer outcome code for a result: `0` on success, [`Error::code`] otherwise
pub fn outcome_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => OUTCOME_SUCCESS,
        Err(e) => e.code(),
    }
}

/// Extension trait for results carrying an [`Error`]
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_survive_context() {
        let err = Error::invalid_slot(KeyKind::Work, 3000).with_context("capture");
        assert_eq!(err.code(), 5);
        assert!(err.is_validation());
        assert!(matches!(err.root(), Error::InvalidKeySlot { index: 3000, .. }));
    }

    #[test]
    fn test_outcome_code() {
        let ok: Result<()> = Ok(());
        assert_eq!(outcome_code(&ok), OUTCOME_SUCCESS);

        let cancelled: Result<()> = Err(Error::UserCancelled);
        assert_eq!(outcome_code(&cancelled), 2);

        let comms: Result<()> = Err(TransportError::Connection.into());
        assert_eq!(outcome_code(&comms), 1);
        assert!(!comms.unwrap_err().is_validation());
    }
}
