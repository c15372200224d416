//! ANSI X9.24-1 triple DES DUKPT
//!
//! Keys are derived from the initial PIN encryption key by walking the set bits
//! of the 21-bit transaction counter from the most significant down, applying
//! the non-reversible key generation process once per bit.

use std::fmt;

use pinpad_core::Ksn;
use pinpad_core::coprocessor::DukptKeyVariant;
use pinpad_core::ksn::{COUNTER_BITS, COUNTER_MASK};
use zeroize::Zeroizing;

use crate::crypto::{des_encrypt_block, tdes_encrypt_block};

/// Length of a DUKPT key
pub const KEY_LEN: usize = 16;

/// Maximum number of one bits in a usable transaction counter
const MAX_COUNTER_ONES: u32 = 10;

const KEY_MASK: [u8; KEY_LEN] = [
    0xC0, 0xC0, 0xC0, 0xC0, 0x00, 0x00, 0x00, 0x00, 0xC0, 0xC0, 0xC0, 0xC0, 0x00, 0x00, 0x00, 0x00,
];
const PIN_VARIANT: [u8; KEY_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF,
];
const MAC_VARIANT: [u8; KEY_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00,
];
const DATA_VARIANT: [u8; KEY_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00,
];

/// A DUKPT key, wiped on drop
pub type DukptKey = Zeroizing<[u8; KEY_LEN]>;

fn xor(key: &[u8; KEY_LEN], mask: &[u8; KEY_LEN]) -> DukptKey {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    for (o, (k, m)) in out.iter_mut().zip(key.iter().zip(mask)) {
        *o = k ^ m;
    }
    out
}

/// Derive the initial key from a base derivation key
pub fn derive_ipek(bdk: &[u8; KEY_LEN], ksn: &Ksn) -> DukptKey {
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&ksn.base().as_bytes()[..8]);

    let mut ipek = Zeroizing::new([0u8; KEY_LEN]);

    let mut left = seed;
    tdes_encrypt_block(bdk, &mut left);
    ipek[..8].copy_from_slice(&left);

    let mut right = seed;
    tdes_encrypt_block(&xor(bdk, &KEY_MASK), &mut right);
    ipek[8..].copy_from_slice(&right);

    ipek
}

/// Non-reversible key generation process
fn generate(key: &[u8; KEY_LEN], register: [u8; 8]) -> DukptKey {
    let half = |key: &[u8; KEY_LEN]| {
        let mut left = [0u8; 8];
        let mut right = [0u8; 8];
        left.copy_from_slice(&key[..8]);
        right.copy_from_slice(&key[8..]);

        let mut block = register;
        block.iter_mut().zip(right).for_each(|(b, r)| *b ^= r);
        des_encrypt_block(&left, &mut block);
        block.iter_mut().zip(right).for_each(|(b, r)| *b ^= r);
        block
    };

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    out[8..].copy_from_slice(&half(key));
    out[..8].copy_from_slice(&half(&xor(key, &KEY_MASK)));
    out
}

/// Derive the transaction key for `ksn`
pub fn derive_key(ipek: &[u8; KEY_LEN], ksn: &Ksn) -> DukptKey {
    let counter = u64::from(ksn.counter());

    let mut tail = [0u8; 8];
    tail.copy_from_slice(&ksn.base().as_bytes()[2..]);
    let mut register = u64::from_be_bytes(tail);

    let mut key = Zeroizing::new(*ipek);
    for shift in (0..COUNTER_BITS).rev() {
        let bit = 1u64 << shift;
        if counter & bit != 0 {
            register |= bit;
            key = generate(&key, register.to_be_bytes());
        }
    }
    key
}

/// Apply a usage variant to a transaction key
pub fn variant_key(key: &[u8; KEY_LEN], variant: DukptKeyVariant) -> DukptKey {
    match variant {
        DukptKeyVariant::Pin => xor(key, &PIN_VARIANT),
        DukptKeyVariant::Mac => xor(key, &MAC_VARIANT),
        DukptKeyVariant::Data => {
            // The data variant is additionally passed through a one-way function
            let variant = xor(key, &DATA_VARIANT);
            let mut out = Zeroizing::new([0u8; KEY_LEN]);
            for (chunk, half) in out.chunks_exact_mut(8).zip(variant.chunks_exact(8)) {
                let mut block = [0u8; 8];
                block.copy_from_slice(half);
                tdes_encrypt_block(&variant, &mut block);
                chunk.copy_from_slice(&block);
            }
            out
        }
    }
}

/// Next usable transaction counter, skipping counters with more than ten one bits
///
/// Returns `None` once the counter space is exhausted.
pub fn next_counter(counter: u32) -> Option<u32> {
    let next = if counter.count_ones() < MAX_COUNTER_ONES {
        counter + 1
    } else {
        counter + (counter & counter.wrapping_neg())
    };
    (next <= COUNTER_MASK).then_some(next)
}

/// Per-group DUKPT state held by the co-processor
#[derive(Clone)]
pub struct DukptRegister {
    ipek: DukptKey,
    ksn: Ksn,
}

impl DukptRegister {
    /// Create a register from an initial key and KSN
    pub fn new(ipek: DukptKey, ksn: Ksn) -> Self {
        Self { ipek, ksn }
    }

    /// Current KSN
    pub const fn ksn(&self) -> Ksn {
        self.ksn
    }

    /// Advance to the next usable counter
    pub fn advance(&mut self) -> Option<Ksn> {
        let next = next_counter(self.ksn.counter())?;
        self.ksn = self.ksn.with_counter(next);
        Some(self.ksn)
    }

    /// Key for the current KSN with a usage variant applied
    pub fn key(&self, variant: DukptKeyVariant) -> DukptKey {
        variant_key(&derive_key(&self.ipek, &self.ksn), variant)
    }
}

impl fmt::Debug for DukptRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DukptRegister")
            .field("ksn", &self.ksn)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const BDK: [u8; 16] = hex!("0123456789ABCDEFFEDCBA9876543210");

    fn ksn(counter: u32) -> Ksn {
        Ksn::new(hex!("FFFF9876543210E00000")).with_counter(counter)
    }

    #[test]
    fn test_ipek_reference_vector() {
        let ipek = derive_ipek(&BDK, &ksn(0));
        assert_eq!(*ipek, hex!("6AC292FAA1315B4D858AB3A3D7D5933A"));

        // The counter does not take part in the initial key
        assert_eq!(*derive_ipek(&BDK, &ksn(7)), *ipek);
    }

    #[test]
    fn test_pin_key_reference_vectors() {
        let ipek = derive_ipek(&BDK, &ksn(0));

        let key = variant_key(&derive_key(&ipek, &ksn(1)), DukptKeyVariant::Pin);
        assert_eq!(*key, hex!("042666B49184CFA368DE9628D0397BC9"));

        let key = variant_key(&derive_key(&ipek, &ksn(2)), DukptKeyVariant::Pin);
        assert_eq!(*key, hex!("C46551CEF9FD24B0AA9AD834130D3BC7"));
    }

    #[test]
    fn test_counter_zero_is_initial_key() {
        let ipek = derive_ipek(&BDK, &ksn(0));
        assert_eq!(*derive_key(&ipek, &ksn(0)), *ipek);
    }

    #[test]
    fn test_variants_differ() {
        let ipek = derive_ipek(&BDK, &ksn(0));
        let key = derive_key(&ipek, &ksn(1));

        let pin = variant_key(&key, DukptKeyVariant::Pin);
        let mac = variant_key(&key, DukptKeyVariant::Mac);
        let data = variant_key(&key, DukptKeyVariant::Data);

        assert_ne!(*pin, *mac);
        assert_ne!(*mac, *data);
        assert_ne!(*data, *xor(&key, &DATA_VARIANT));
    }

    #[test]
    fn test_next_counter_skips_heavy_counters() {
        assert_eq!(next_counter(0), Some(1));
        assert_eq!(next_counter(1), Some(2));

        // Ten one bits: jump by the lowest set bit
        assert_eq!(next_counter(0b11_1111_1111), Some(0b100_0000_0000));
        assert_eq!(next_counter(0b1111_1111_1100), Some(0b1_0000_0000_0000));

        assert_eq!(next_counter(COUNTER_MASK), None);
    }

    #[test]
    fn test_register_advances_monotonically() {
        let mut register = DukptRegister::new(derive_ipek(&BDK, &ksn(0)), ksn(0));
        let mut last = register.ksn();
        for _ in 0..64 {
            let next = register.advance().unwrap();
            assert!(next > last);
            assert!(next.counter().count_ones() <= 10);
            last = next;
        }
    }

    #[test]
    fn test_debug_hides_key() {
        let register = DukptRegister::new(derive_ipek(&BDK, &ksn(0)), ksn(0));
        let debug = format!("{register:?}");
        assert!(debug.contains("FFFF9876543210E00000"));
        assert!(!debug.to_lowercase().contains("6ac292"));
    }
}
