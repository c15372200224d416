//! Errors raised by the co-processor boundary

use thiserror::Error;

/// Failure to reach the co-processor or to complete a call across the boundary
///
/// A transport error says nothing about the request itself. Requests the
/// co-processor understood and refused are reported through a non-zero
/// [`PedStatus`](crate::PedStatus) instead.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The co-processor service is not connected
    #[error("Failed to connect to the co-processor")]
    Connection,

    /// The request could not be delivered or the reply was lost
    #[error("Failed to transmit request")]
    Transmission,

    /// The co-processor is in a faulted state
    #[error("Co-processor fault")]
    Device,

    /// The boundary call timed out
    #[error("Co-processor call timed out")]
    Timeout,

    /// The boundary call was cancelled
    #[error("Co-processor call cancelled")]
    Cancelled,

    /// Driver specific failure
    #[error("Driver error code: {0}")]
    Driver(i32),

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a new driver error
    pub const fn driver(code: i32) -> Self {
        Self::Driver(code)
    }

    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}
