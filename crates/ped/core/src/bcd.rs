//! Packed BCD helpers

/// Pack ASCII decimal digits two per byte into `out`
///
/// An odd digit count leaves the low nibble of the final byte at zero. Bytes of
/// `out` beyond the packed digits are left untouched. Callers guarantee that
/// `digits` only holds ASCII digits and that `out` is large enough.
pub(crate) fn pack_into(digits: &[u8], out: &mut [u8]) {
    for (byte, pair) in out.iter_mut().zip(digits.chunks(2)) {
        let high = (pair[0] - b'0') << 4;
        let low = pair.get(1).map_or(0, |d| d - b'0');
        *byte = high | low;
    }
}

/// Check that every byte is an ASCII decimal digit
pub(crate) fn is_digits(value: &[u8]) -> bool {
    value.iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_even_and_odd() {
        let mut out = [0xFF; 4];
        pack_into(b"1234", &mut out);
        assert_eq!(out, [0x12, 0x34, 0xFF, 0xFF]);

        let mut out = [0xFF; 4];
        pack_into(b"98765", &mut out);
        assert_eq!(out, [0x98, 0x76, 0x50, 0xFF]);
    }

    #[test]
    fn test_is_digits() {
        assert!(is_digits(b"0123456789"));
        assert!(is_digits(b""));
        assert!(!is_digits(b"12a4"));
    }
}
