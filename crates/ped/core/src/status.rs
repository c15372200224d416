//! Status codes returned by the secure co-processor

use std::fmt;

use tracing::Level;

/// Integer status returned by the co-processor for a request
///
/// Zero means success. Any other value is vendor defined and is passed back to
/// callers unchanged where an operation exposes the raw status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PedStatus(i32);

impl PedStatus {
    /// Success status
    pub const OK: Self = Self(0);

    /// Create a status from its raw code
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Raw status code
    pub const fn code(&self) -> i32 {
        self.0
    }

    /// Check if this status indicates success
    pub const fn is_success(&self) -> bool {
        self.0 == 0
    }

    /// Get the appropriate tracing level for this status
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }
}

impl From<i32> for PedStatus {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<PedStatus> for i32 {
    fn from(status: PedStatus) -> Self {
        status.0
    }
}

impl fmt::Display for PedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "{} (success)", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
