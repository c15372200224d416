//! DUKPT key serial numbers

use std::cmp::Ordering;
use std::fmt;

use crate::{Error, Result};

/// Length of a key serial number in bytes
pub const KSN_LEN: usize = 10;

/// Number of bits used by the transaction counter
pub const COUNTER_BITS: u32 = 21;

/// Mask selecting the transaction counter from the low bits of a KSN
pub const COUNTER_MASK: u32 = (1 << COUNTER_BITS) - 1;

/// A 10-byte DUKPT key serial number
///
/// The low 21 bits hold the transaction counter, the remaining bits identify the
/// initial key. Ordering compares the KSN as a big-endian integer, so a later
/// transaction of the same key always compares greater.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ksn([u8; KSN_LEN]);

impl Ksn {
    /// Create a KSN from raw bytes
    pub const fn new(bytes: [u8; KSN_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a KSN from a slice, which must be exactly 10 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KSN_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidInput("KSN must be 10 bytes"))?;
        Ok(Self(bytes))
    }

    /// Raw KSN bytes
    pub const fn as_bytes(&self) -> &[u8; KSN_LEN] {
        &self.0
    }

    /// Transaction counter (low 21 bits)
    pub fn counter(&self) -> u32 {
        let tail = u32::from_be_bytes([0, self.0[7], self.0[8], self.0[9]]);
        tail & COUNTER_MASK
    }

    /// The KSN with its transaction counter cleared
    pub fn base(&self) -> Self {
        self.with_counter(0)
    }

    /// The KSN with its transaction counter replaced
    ///
    /// Only the low 21 bits of `counter` are used.
    pub fn with_counter(&self, counter: u32) -> Self {
        let mut bytes = self.0;
        let counter = counter & COUNTER_MASK;
        bytes[7] = (bytes[7] & 0xE0) | (counter >> 16) as u8;
        bytes[8] = (counter >> 8) as u8;
        bytes[9] = counter as u8;
        Self(bytes)
    }
}

impl PartialOrd for Ksn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ksn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl From<[u8; KSN_LEN]> for Ksn {
    fn from(bytes: [u8; KSN_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Ksn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl fmt::Debug for Ksn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ksn({self})")
    }
}
