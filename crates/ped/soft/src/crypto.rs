//! DES and triple DES primitives used by the software co-processor
//!
//! Keys of 8, 16 and 24 bytes select single DES, two-key and three-key triple
//! DES respectively.

use cbc_mac::{CbcMac, Mac};
use cipher::{
    BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit,
    KeyIvInit, block_padding::NoPadding, generic_array::GenericArray,
};
use des::{Des, TdesEde2, TdesEde3};
use pinpad_core::coprocessor::{Chaining, CipherDirection, KCV_LEN};

/// DES block length
pub const BLOCK_LEN: usize = 8;

/// Reasons a cipher operation could not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoFault {
    /// Key is not 8, 16 or 24 bytes
    KeyLength,
    /// Data is empty or not a multiple of the block length
    DataLength,
    /// CBC requested without an IV
    MissingIv,
}

/// Run a DES or triple DES operation in place
pub fn apply(
    key: &[u8],
    chaining: Chaining,
    direction: CipherDirection,
    iv: Option<&[u8; BLOCK_LEN]>,
    data: &mut [u8],
) -> Result<(), CryptoFault> {
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        return Err(CryptoFault::DataLength);
    }

    match key.len() {
        8 => run::<Des>(key, chaining, direction, iv, data),
        16 => run::<TdesEde2>(key, chaining, direction, iv, data),
        24 => run::<TdesEde3>(key, chaining, direction, iv, data),
        _ => Err(CryptoFault::KeyLength),
    }
}

fn run<C>(
    key: &[u8],
    chaining: Chaining,
    direction: CipherDirection,
    iv: Option<&[u8; BLOCK_LEN]>,
    data: &mut [u8],
) -> Result<(), CryptoFault>
where
    C: BlockCipher + BlockEncrypt + BlockDecrypt + KeyInit,
{
    let len = data.len();
    let done = match (chaining, direction) {
        (Chaining::Ecb, CipherDirection::Encrypt) => C::new_from_slice(key)
            .map_err(|_| CryptoFault::KeyLength)?
            .encrypt_padded::<NoPadding>(data, len)
            .is_ok(),
        (Chaining::Ecb, CipherDirection::Decrypt) => C::new_from_slice(key)
            .map_err(|_| CryptoFault::KeyLength)?
            .decrypt_padded::<NoPadding>(data)
            .is_ok(),
        (Chaining::Cbc, CipherDirection::Encrypt) => {
            let iv = iv.ok_or(CryptoFault::MissingIv)?;
            cbc::Encryptor::<C>::new_from_slices(key, iv)
                .map_err(|_| CryptoFault::KeyLength)?
                .encrypt_padded_mut::<NoPadding>(data, len)
                .is_ok()
        }
        (Chaining::Cbc, CipherDirection::Decrypt) => {
            let iv = iv.ok_or(CryptoFault::MissingIv)?;
            cbc::Decryptor::<C>::new_from_slices(key, iv)
                .map_err(|_| CryptoFault::KeyLength)?
                .decrypt_padded_mut::<NoPadding>(data)
                .is_ok()
        }
    };

    if done {
        Ok(())
    } else {
        Err(CryptoFault::DataLength)
    }
}

/// Encipher in ECB mode
pub fn ecb_encrypt(key: &[u8], data: &mut [u8]) -> Result<(), CryptoFault> {
    apply(key, Chaining::Ecb, CipherDirection::Encrypt, None, data)
}

/// Decipher in ECB mode
pub fn ecb_decrypt(key: &[u8], data: &mut [u8]) -> Result<(), CryptoFault> {
    apply(key, Chaining::Ecb, CipherDirection::Decrypt, None, data)
}

/// Key check value: the first three bytes of the key applied to a zero block
pub fn kcv(key: &[u8]) -> Result<[u8; KCV_LEN], CryptoFault> {
    let mut block = [0u8; BLOCK_LEN];
    ecb_encrypt(key, &mut block)?;

    let mut check = [0u8; KCV_LEN];
    check.copy_from_slice(&block[..KCV_LEN]);
    Ok(check)
}

fn zero_padded(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    let rem = padded.len() % BLOCK_LEN;
    if padded.is_empty() || rem != 0 {
        padded.resize(padded.len() + BLOCK_LEN - rem, 0);
    }
    padded
}

/// ANSI X9.19 retail MAC with a 16-byte key
///
/// Single DES CBC-MAC under the left half of the key, then the final block is
/// deciphered with the right half and enciphered again with the left half.
pub fn retail_mac(key: &[u8], data: &[u8]) -> Result<[u8; BLOCK_LEN], CryptoFault> {
    if key.len() != 16 {
        return Err(CryptoFault::KeyLength);
    }
    let (left, right) = key.split_at(8);

    let mut mac =
        <CbcMac<Des> as Mac>::new_from_slice(left).map_err(|_| CryptoFault::KeyLength)?;
    mac.update(&zero_padded(data));
    let mut block = mac.finalize().into_bytes();

    Des::new_from_slice(right)
        .map_err(|_| CryptoFault::KeyLength)?
        .decrypt_block(&mut block);
    Des::new_from_slice(left)
        .map_err(|_| CryptoFault::KeyLength)?
        .encrypt_block(&mut block);

    Ok(block.into())
}

/// Triple DES CBC-MAC with zero padding
pub fn tdes_cbc_mac(key: &[u8], data: &[u8]) -> Result<[u8; BLOCK_LEN], CryptoFault> {
    let padded = zero_padded(data);
    let block = match key.len() {
        16 => {
            let mut mac = <CbcMac<TdesEde2> as Mac>::new_from_slice(key)
                .map_err(|_| CryptoFault::KeyLength)?;
            mac.update(&padded);
            mac.finalize().into_bytes()
        }
        24 => {
            let mut mac = <CbcMac<TdesEde3> as Mac>::new_from_slice(key)
                .map_err(|_| CryptoFault::KeyLength)?;
            mac.update(&padded);
            mac.finalize().into_bytes()
        }
        _ => return Err(CryptoFault::KeyLength),
    };
    Ok(block.into())
}

/// Encipher a single block with two-key triple DES
pub(crate) fn tdes_encrypt_block(key: &[u8; 16], block: &mut [u8; BLOCK_LEN]) {
    TdesEde2::new(GenericArray::from_slice(key))
        .encrypt_block(GenericArray::from_mut_slice(block));
}

/// Encipher a single block with single DES
pub(crate) fn des_encrypt_block(key: &[u8; 8], block: &mut [u8; BLOCK_LEN]) {
    Des::new(GenericArray::from_slice(key)).encrypt_block(GenericArray::from_mut_slice(block));
}
