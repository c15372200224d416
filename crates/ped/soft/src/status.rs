//! Status codes reported by the software co-processor

use pinpad_core::PedStatus;

/// The addressed slot holds no key
pub const NO_KEY: PedStatus = PedStatus::new(-1);
/// The supplied key check value does not match the key
pub const KCV_MISMATCH: PedStatus = PedStatus::new(-2);
/// A key or data buffer has an unusable length
pub const BAD_LENGTH: PedStatus = PedStatus::new(-3);
/// The combination of parameters is not supported
pub const UNSUPPORTED: PedStatus = PedStatus::new(-4);
/// No RSA engine is available
pub const ENGINE_UNAVAILABLE: PedStatus = PedStatus::new(-5);
/// The DUKPT transaction counter is exhausted
pub const KSN_EXHAUSTED: PedStatus = PedStatus::new(-7);
/// A PIN request is already pending
pub const BUSY: PedStatus = PedStatus::new(-8);
