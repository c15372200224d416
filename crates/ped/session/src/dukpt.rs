//! DUKPT key lifecycle
//!
//! Each group holds an initial key and a key serial number. The co-processor
//! derives transaction keys itself; this module validates requests and keeps a
//! per-group mirror of the last KSN seen so regressions are noticed.

use bytes::Bytes;
use pinpad_core::coprocessor::{
    Chaining, CipherDirection, DukptKeyVariant, KCV_LEN, KeyMaterial, MacAlgorithm,
};
use pinpad_core::{
    Coprocessor, Error, KeySlot, Ksn, PanMask, PinBlock, PinBlockMode, Request, Result,
    TransportError,
};
use tracing::{debug, instrument, warn};

use crate::pinpad::{PinPad, submit_ok};

const BLOCK_LEN: usize = 8;

/// Output of a DUKPT operation together with the KSN it ran under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DukptOutput {
    /// Ciphertext, plaintext or MAC
    pub data: Bytes,
    /// KSN reported by the co-processor
    pub ksn: Ksn,
}

impl<C: Coprocessor> PinPad<C> {
    fn dukpt_slot(&self, group: u8) -> Result<KeySlot> {
        self.config.registry.dukpt_group(group)
    }

    /// Record a KSN reported by the co-processor
    ///
    /// The mirror only moves forward. A lower KSN is logged and returned as
    /// reported, leaving the mirror untouched.
    fn observe_ksn(&self, group: KeySlot, reported: Option<Ksn>) -> Result<Ksn> {
        let ksn = reported.ok_or_else(|| {
            Error::Communication(TransportError::other("DUKPT reply carries no KSN"))
        })?;

        let mut mirror = self.ksn_mirror.lock();
        match mirror.get(&group.index()) {
            Some(seen) if ksn < *seen => {
                warn!(%group, %ksn, last = %seen, "Co-processor reported a KSN below the last one seen");
            }
            _ => {
                mirror.insert(group.index(), ksn);
            }
        }
        Ok(ksn)
    }

    /// Last KSN mirrored for a group, if any
    ///
    /// Between injections the mirror never decreases. Injecting an initial key
    /// starts the group over, so the mirror is reset to the injected KSN even
    /// when that is lower. Erasing the group clears it.
    pub fn mirrored_ksn(&self, group: u8) -> Option<Ksn> {
        self.ksn_mirror.lock().get(&u16::from(group)).copied()
    }

    /// Inject an initial key into a DUKPT group
    ///
    /// `source_key` is the master key index `key` is enciphered under, or `0`
    /// for a clear key. `check` is the expected 3-byte key check value.
    #[instrument(level = "debug", skip(self, key, check))]
    pub fn inject_initial_key(
        &self,
        group: u8,
        source_key: u8,
        key: &[u8],
        ksn: &[u8],
        check: Option<&[u8]>,
    ) -> Result<Ksn> {
        let slot = self.dukpt_slot(group)?;
        if key.is_empty() {
            return Err(Error::InvalidInput("initial key is empty"));
        }
        let ksn = Ksn::from_slice(ksn)?;
        let check = check
            .map(|kcv| {
                <[u8; KCV_LEN]>::try_from(kcv)
                    .map_err(|_| Error::InvalidInput("key check value must be 3 bytes"))
            })
            .transpose()?;

        let request = Request::DukptWriteTik {
            group: slot,
            source_key,
            key: KeyMaterial::from_slice(key),
            ksn,
            check,
        };
        let reply = submit_ok(&self.ped, &request)?;

        let ksn = reply.ksn.unwrap_or(ksn);
        self.ksn_mirror.lock().insert(slot.index(), ksn);
        debug!(%slot, %ksn, "Initial key injected");
        Ok(ksn)
    }

    /// Encipher or decipher data under the group's current key
    ///
    /// `data` must be a non-empty multiple of 8 bytes. CBC requires an 8-byte
    /// IV; ECB ignores it.
    pub fn compute_des(
        &self,
        group: u8,
        variant: DukptKeyVariant,
        iv: Option<&[u8]>,
        data: &[u8],
        direction: CipherDirection,
        chaining: Chaining,
    ) -> Result<DukptOutput> {
        let slot = self.dukpt_slot(group)?;
        if data.is_empty() {
            return Err(Error::InvalidInput("cipher input is empty"));
        }
        if data.len() % BLOCK_LEN != 0 {
            return Err(Error::InvalidInput("cipher input must be a multiple of 8 bytes"));
        }
        let iv = match (chaining, iv) {
            (Chaining::Ecb, _) => None,
            (Chaining::Cbc, None) => return Err(Error::InvalidInput("CBC requires an IV")),
            (Chaining::Cbc, Some(iv)) => Some(
                <[u8; BLOCK_LEN]>::try_from(iv)
                    .map_err(|_| Error::InvalidInput("IV must be 8 bytes"))?,
            ),
        };

        let request = Request::DukptCipher {
            group: slot,
            variant,
            direction,
            chaining,
            iv,
            data: Bytes::copy_from_slice(data),
        };
        let reply = submit_ok(&self.ped, &request)?;
        let ksn = self.observe_ksn(slot, reply.ksn)?;
        Ok(DukptOutput {
            data: reply.data,
            ksn,
        })
    }

    /// Compute a MAC under the group's current key
    ///
    /// With `advance` set the KSN moves to the next transaction first.
    pub fn compute_mac(
        &self,
        group: u8,
        data: &[u8],
        algorithm: MacAlgorithm,
        advance: bool,
    ) -> Result<DukptOutput> {
        let slot = self.dukpt_slot(group)?;
        if data.is_empty() {
            return Err(Error::InvalidInput("MAC input is empty"));
        }

        let request = Request::DukptMac {
            group: slot,
            algorithm,
            advance,
            data: Bytes::copy_from_slice(data),
        };
        let reply = submit_ok(&self.ped, &request)?;
        let ksn = self.observe_ksn(slot, reply.ksn)?;
        Ok(DukptOutput {
            data: reply.data,
            ksn,
        })
    }

    /// Read the group's KSN without advancing it
    pub fn current_ksn(&self, group: u8) -> Result<Ksn> {
        let slot = self.dukpt_slot(group)?;
        let reply = submit_ok(&self.ped, &Request::DukptReadKsn { group: slot })?;
        self.observe_ksn(slot, reply.ksn)
    }

    /// Advance the group's KSN to the next transaction
    pub fn increase_ksn(&self, group: u8) -> Result<Ksn> {
        let slot = self.dukpt_slot(group)?;
        let reply = submit_ok(&self.ped, &Request::DukptIncreaseKsn { group: slot })?;
        self.observe_ksn(slot, reply.ksn)
    }

    /// Format a known PIN and encipher it under the group's next PIN key
    ///
    /// An empty `pan` disables PAN masking.
    pub fn encrypt_pin(&self, group: u8, pin: &str, pan: &str, mode: u8) -> Result<DukptOutput> {
        let slot = self.dukpt_slot(group)?;
        let mode = PinBlockMode::from_code(mode)?;
        let mask = PanMask::for_account(pan, mode)?;
        let block = PinBlock::build(pin.as_bytes(), mode, &mask)?;

        let reply = submit_ok(&self.ped, &Request::DukptPinBlock { group: slot, block })?;
        let ksn = self.observe_ksn(slot, reply.ksn)?;
        Ok(DukptOutput {
            data: reply.data,
            ksn,
        })
    }
}
