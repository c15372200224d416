//! PAN normalization for PIN block masking
//!
//! The PAN field of an ISO 9564 format 0 block is built from the 12 rightmost
//! digits of the account number, excluding the check digit, left padded with
//! `'0'` to 16 characters and packed into an 8-byte BCD segment. Depending on
//! the PIN block mode the segment is placed at the start or the end of an 8- or
//! 16-byte XOR mask.

use std::fmt;

use crate::bcd;
use crate::mode::{MaskLayout, PinBlockMode};
use crate::{Error, Result};

/// Minimum accepted account number length
pub const PAN_MIN_LEN: usize = 13;
/// Maximum accepted account number length
pub const PAN_MAX_LEN: usize = 19;

/// Number of account digits used in the PAN field
const PAN_DIGITS: usize = 12;

/// An account number reduced to the 16-character PAN field
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedPan {
    field: [u8; 16],
}

impl NormalizedPan {
    /// Normalize an account number of 13 to 19 digits
    pub fn parse(account: &str) -> Result<Self> {
        let digits = account.as_bytes();
        if !(PAN_MIN_LEN..=PAN_MAX_LEN).contains(&digits.len()) {
            return Err(Error::InvalidPan("account number must be 13 to 19 digits"));
        }
        if !bcd::is_digits(digits) {
            return Err(Error::InvalidPan("account number must only contain digits"));
        }

        // Drop the check digit, keep the 12 digits before it
        let end = digits.len() - 1;
        let start = end - PAN_DIGITS;

        let mut field = [b'0'; 16];
        field[16 - PAN_DIGITS..].copy_from_slice(&digits[start..end]);

        Ok(Self { field })
    }

    /// The 16-character ASCII PAN field
    pub const fn field(&self) -> &[u8; 16] {
        &self.field
    }

    /// The PAN field packed into 8 BCD bytes
    pub fn segment(&self) -> [u8; 8] {
        let mut segment = [0u8; 8];
        bcd::pack_into(&self.field, &mut segment);
        segment
    }

    /// Build the XOR mask for the given layout
    pub fn mask(&self, layout: MaskLayout) -> PanMask {
        let mut mask = PanMask::zero(layout);
        let offset = layout.segment_offset();
        mask.bytes[offset..offset + 8].copy_from_slice(&self.segment());
        mask
    }
}

impl fmt::Debug for NormalizedPan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the last four digits of the field are shown
        let tail = String::from_utf8_lossy(&self.field[12..]);
        write!(f, "NormalizedPan(****{tail})")
    }
}

/// XOR mask applied to the clear PIN field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanMask {
    bytes: [u8; 16],
    len: usize,
}

impl PanMask {
    /// An all-zero mask, used when no account number is available
    pub const fn zero(layout: MaskLayout) -> Self {
        Self {
            bytes: [0u8; 16],
            len: layout.size(),
        }
    }

    /// Build the mask for `mode` from an account number
    ///
    /// An empty account number yields an all-zero mask of the mode's length.
    pub fn for_account(account: &str, mode: PinBlockMode) -> Result<Self> {
        let layout = mode.mask_layout();
        if account.is_empty() {
            return Ok(Self::zero(layout));
        }
        Ok(NormalizedPan::parse(account)?.mask(layout))
    }

    /// Mask bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Mask length in bytes
    pub const fn size(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sixteen_digit_pan() {
        let pan = NormalizedPan::parse("4111111111111111").unwrap();
        assert_eq!(pan.field(), b"0000111111111111");
        assert_eq!(
            pan.segment(),
            [0x00, 0x00, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11]
        );
    }

    #[test]
    fn test_normalize_drops_check_digit() {
        let pan = NormalizedPan::parse("5432109876543210987").unwrap();
        // 19 digits: the 12 before the final check digit
        assert_eq!(pan.field(), b"0000987654321098");
        assert_eq!(hex::encode(pan.segment()), "0000987654321098");
    }

    #[test]
    fn test_length_bounds() {
        for len in 0..=25 {
            let account = "4".repeat(len);
            let result = NormalizedPan::parse(&account);
            if (PAN_MIN_LEN..=PAN_MAX_LEN).contains(&len) {
                assert!(result.is_ok(), "length {len} should be accepted");
            } else {
                assert!(
                    matches!(result, Err(Error::InvalidPan(_))),
                    "length {len} should be rejected"
                );
            }
        }
    }

    #[test]
    fn test_rejects_non_digits() {
        assert!(matches!(
            NormalizedPan::parse("41111111111x1111"),
            Err(Error::InvalidPan(_))
        ));
    }

    #[test]
    fn test_mask_layouts() {
        let pan = NormalizedPan::parse("4111111111111111").unwrap();
        let segment = pan.segment();

        let short = pan.mask(MaskLayout::Short);
        assert_eq!(short.as_bytes(), segment);

        let leading = pan.mask(MaskLayout::Leading);
        assert_eq!(&leading.as_bytes()[..8], segment);
        assert_eq!(&leading.as_bytes()[8..], [0u8; 8]);

        let trailing = pan.mask(MaskLayout::Trailing);
        assert_eq!(&trailing.as_bytes()[..8], [0u8; 8]);
        assert_eq!(&trailing.as_bytes()[8..], segment);
    }

    #[test]
    fn test_empty_account_gives_zero_mask() {
        let mask = PanMask::for_account("", PinBlockMode::Long).unwrap();
        assert_eq!(mask.as_bytes(), [0u8; 16]);

        let mask = PanMask::for_account("", PinBlockMode::Short).unwrap();
        assert_eq!(mask.size(), 8);
    }

    #[test]
    fn test_debug_redacts_account() {
        let pan = NormalizedPan::parse("4111111111111111").unwrap();
        assert_eq!(format!("{pan:?}"), "NormalizedPan(****1111)");
    }
}
