//! PIN block construction
//!
//! The clear PIN field holds the PIN length in its first byte followed by the
//! PIN digits in packed BCD. An odd digit count is padded with a `0xF` nibble and
//! every remaining byte is `0xFF`. The field is XORed with the [`PanMask`] of the
//! selected mode to produce the block handed to the co-processor.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::bcd;
use crate::mode::PinBlockMode;
use crate::pan::PanMask;
use crate::{Error, Result};

/// Maximum number of PIN digits
pub const MAX_PIN_LEN: usize = 12;

/// Size of the largest PIN block
pub const MAX_BLOCK_LEN: usize = 16;

/// Build the clear PIN field for `pin`
///
/// The result is always 16 bytes; short modes use the first 8.
pub fn clear_pin_field(pin: &[u8]) -> Result<[u8; MAX_BLOCK_LEN]> {
    validate_pin(pin)?;

    let mut field = [0xFF; MAX_BLOCK_LEN];
    field[0] = pin.len() as u8;
    bcd::pack_into(pin, &mut field[1..]);
    if pin.len() % 2 != 0 {
        field[pin.len() / 2 + 1] |= 0x0F;
    }

    Ok(field)
}

fn validate_pin(pin: &[u8]) -> Result<()> {
    if pin.len() > MAX_PIN_LEN {
        return Err(Error::InvalidInput("PIN longer than 12 digits"));
    }
    if !bcd::is_digits(pin) {
        return Err(Error::InvalidInput("PIN must only contain digits"));
    }
    Ok(())
}

/// A formatted PIN block ready for encipherment
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PinBlock {
    bytes: [u8; MAX_BLOCK_LEN],
    len: usize,
    #[zeroize(skip)]
    mode: PinBlockMode,
}

impl PinBlock {
    /// Build the PIN block for `pin` in `mode` using `mask`
    ///
    /// An empty PIN is the valid "no PIN entered" case and yields an all-zero
    /// block of the mode's length.
    pub fn build(pin: &[u8], mode: PinBlockMode, mask: &PanMask) -> Result<Self> {
        let len = mode.block_len();
        if mask.size() != len {
            return Err(Error::InvalidInput("PAN mask does not match the PIN block mode"));
        }

        let mut block = Self {
            bytes: [0u8; MAX_BLOCK_LEN],
            len,
            mode,
        };

        if pin.is_empty() {
            return Ok(block);
        }

        let mut field = clear_pin_field(pin)?;
        for (out, (clear, mask)) in block
            .bytes
            .iter_mut()
            .zip(field.iter().zip(mask.as_bytes()))
        {
            *out = clear ^ mask;
        }
        field.zeroize();

        Ok(block)
    }

    /// The block bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Block length in bytes
    pub const fn size(&self) -> usize {
        self.len
    }

    /// Mode the block was built for
    pub const fn mode(&self) -> PinBlockMode {
        self.mode
    }

    /// Whether this is the all-zero "no PIN" block
    pub fn is_blank(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for PinBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinBlock")
            .field("len", &self.len)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pan::NormalizedPan;

    const PAN: &str = "4111111111111111";

    fn mask(mode: PinBlockMode) -> PanMask {
        PanMask::for_account(PAN, mode).unwrap()
    }

    #[test]
    fn test_clear_field_even_pin() {
        let field = clear_pin_field(b"1234").unwrap();
        assert_eq!(hex::encode(&field[..8]), "041234ffffffffff");
        assert_eq!(&field[8..], [0xFF; 8]);
    }

    #[test]
    fn test_clear_field_odd_pin_padded_with_f() {
        let field = clear_pin_field(b"12345").unwrap();
        assert_eq!(hex::encode(&field[..8]), "0512345fffffffff");
    }

    #[test]
    fn test_short_mode_reference_block() {
        let block = PinBlock::build(b"1234", PinBlockMode::Short, &mask(PinBlockMode::Short))
            .unwrap();
        assert_eq!(block.size(), 8);
        assert_eq!(hex::encode(block.as_bytes()), "041225eeeeeeeeee");
    }

    #[test]
    fn test_long_mode_differs_from_short() {
        let short = PinBlock::build(b"1234", PinBlockMode::Short, &mask(PinBlockMode::Short))
            .unwrap();
        let long =
            PinBlock::build(b"1234", PinBlockMode::Long, &mask(PinBlockMode::Long)).unwrap();

        assert_eq!(long.size(), 16);
        assert!(!long.is_blank());
        assert_ne!(short.as_bytes(), long.as_bytes());
        assert_eq!(
            hex::encode(long.as_bytes()),
            "041225eeeeeeeeeeffffffffffffffff"
        );
    }

    #[test]
    fn test_trailing_mode_masks_second_half() {
        let block = PinBlock::build(
            b"1234",
            PinBlockMode::LongTrailing,
            &mask(PinBlockMode::LongTrailing),
        )
        .unwrap();
        assert_eq!(
            hex::encode(block.as_bytes()),
            "041234ffffffffffffffeeeeeeeeeeee"
        );
    }

    #[test]
    fn test_empty_pin_is_zero_block_in_every_mode() {
        for mode in PinBlockMode::ALL {
            let block = PinBlock::build(b"", mode, &mask(mode)).unwrap();
            assert_eq!(block.size(), mode.block_len());
            assert!(block.is_blank());
        }
    }

    #[test]
    fn test_unmask_recovers_clear_field() {
        let pan = NormalizedPan::parse(PAN).unwrap();
        let digits = b"987654321098";

        for len in 1..=MAX_PIN_LEN {
            let pin = &digits[..len];
            for mode in PinBlockMode::ALL {
                let mask = pan.mask(mode.mask_layout());
                let block = PinBlock::build(pin, mode, &mask).unwrap();
                let clear = clear_pin_field(pin).unwrap();

                let unmasked: Vec<u8> = block
                    .as_bytes()
                    .iter()
                    .zip(mask.as_bytes())
                    .map(|(b, m)| b ^ m)
                    .collect();
                assert_eq!(unmasked, &clear[..mode.block_len()], "len {len}, {mode}");
                assert_eq!(unmasked[0] as usize, len);
            }
        }
    }

    #[test]
    fn test_rejects_bad_pins() {
        let mask = mask(PinBlockMode::Short);
        assert!(matches!(
            PinBlock::build(b"1234567890123", PinBlockMode::Short, &mask),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            PinBlock::build(b"12a4", PinBlockMode::Short, &mask),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_mismatched_mask() {
        let short_mask = mask(PinBlockMode::Short);
        assert!(PinBlock::build(b"1234", PinBlockMode::Long, &short_mask).is_err());
    }

    #[test]
    fn test_debug_hides_block() {
        let block = PinBlock::build(b"1234", PinBlockMode::Short, &mask(PinBlockMode::Short))
            .unwrap();
        let debug = format!("{block:?}");
        assert!(!debug.contains("41225"));
        assert!(debug.contains("len: 8"));
    }
}
