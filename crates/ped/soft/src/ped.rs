//! The in-memory co-processor

use std::collections::HashMap;

use bytes::Bytes;
use pinpad_core::coprocessor::{
    Chaining, CipherDirection, DukptKeyVariant, KeyMaterial, MacAlgorithm, PinEntryRequest,
    PinEvent, PinEventSender,
};
use pinpad_core::{
    Coprocessor, KeyKind, KeySlot, Ksn, PedStatus, PinBlock, Reply, Request, TransportError,
};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, CryptoFault};
use crate::dukpt::{DukptRegister, KEY_LEN};
use crate::journal::Journal;
use crate::script::{ScriptRun, ScriptStep};
use crate::status;

impl From<CryptoFault> for PedStatus {
    fn from(fault: CryptoFault) -> Self {
        match fault {
            CryptoFault::KeyLength | CryptoFault::DataLength => status::BAD_LENGTH,
            CryptoFault::MissingIv => status::UNSUPPORTED,
        }
    }
}

/// Faults injected into the software co-processor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    /// Every call fails with a transport error
    pub transport_failure: bool,
    /// Every request is refused with this status
    pub reject_requests: Option<PedStatus>,
    /// Asynchronous PIN requests are refused with this status
    pub reject_pin_entry: Option<PedStatus>,
}

#[derive(Debug, Clone)]
struct RsaRecord {
    modulus: Bytes,
    exponent: Bytes,
    key_info: Bytes,
}

/// Software implementation of the co-processor boundary
///
/// Keys live in memory for the lifetime of the value. Asynchronous PIN requests
/// replay a scripted list of events on a background thread.
#[derive(Debug, Default)]
pub struct SoftPed {
    master_keys: HashMap<u16, KeyMaterial>,
    work_keys: HashMap<u16, KeyMaterial>,
    dukpt: HashMap<u16, DukptRegister>,
    rsa: HashMap<u16, RsaRecord>,
    script: Vec<ScriptStep>,
    faults: Faults,
    journal: Journal,
    pending: Option<ScriptRun>,
}

fn is_des_key_len(len: usize) -> bool {
    matches!(len, 8 | 16 | 24)
}

fn request_slot(request: &Request) -> Option<KeySlot> {
    match request {
        Request::EncryptPinBlock { slot, .. }
        | Request::WriteMasterKey { slot, .. }
        | Request::WriteWorkKey { slot, .. }
        | Request::KeyExists { slot }
        | Request::EraseKey { slot }
        | Request::RsaWrite { slot, .. }
        | Request::RsaCompute { slot, .. } => Some(*slot),
        Request::DukptWriteTik { group, .. }
        | Request::DukptCipher { group, .. }
        | Request::DukptMac { group, .. }
        | Request::DukptPinBlock { group, .. }
        | Request::DukptReadKsn { group }
        | Request::DukptIncreaseKsn { group } => Some(*group),
    }
}

impl SoftPed {
    /// Create an empty co-processor
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a clear master key
    pub fn with_master_key(mut self, index: u16, key: &[u8]) -> Self {
        self.master_keys.insert(index, KeyMaterial::from_slice(key));
        self
    }

    /// Load a clear work key
    pub fn with_work_key(mut self, index: u16, key: &[u8]) -> Self {
        self.work_keys.insert(index, KeyMaterial::from_slice(key));
        self
    }

    /// Load a DUKPT initial key
    pub fn with_dukpt_key(mut self, group: u8, ipek: [u8; KEY_LEN], ksn: Ksn) -> Self {
        self.dukpt
            .insert(u16::from(group), DukptRegister::new(Zeroizing::new(ipek), ksn));
        self
    }

    /// Set the events replayed for asynchronous PIN requests
    pub fn with_pin_script(mut self, steps: Vec<ScriptStep>) -> Self {
        self.script = steps;
        self
    }

    /// Set the injected faults
    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Make every call fail with a transport error
    pub fn with_transport_failure(mut self) -> Self {
        self.faults.transport_failure = true;
        self
    }

    /// Replace the events replayed for asynchronous PIN requests
    pub fn set_pin_script(&mut self, steps: Vec<ScriptStep>) {
        self.script = steps;
    }

    /// Injected faults
    pub fn faults_mut(&mut self) -> &mut Faults {
        &mut self.faults
    }

    /// Shared handle to the call journal
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Current KSN of a DUKPT group, bypassing the journal
    pub fn dukpt_ksn(&self, group: u8) -> Option<Ksn> {
        self.dukpt.get(&u16::from(group)).map(DukptRegister::ksn)
    }

    fn dispatch(&mut self, request: &Request) -> Result<Reply, PedStatus> {
        match request {
            Request::EncryptPinBlock { slot, block, .. } => self.encrypt_pin_block(slot, block),
            Request::WriteMasterKey { slot, key } => {
                if !is_des_key_len(key.len()) {
                    return Err(status::BAD_LENGTH);
                }
                self.master_keys.insert(slot.index(), key.clone());
                Ok(Reply::ok())
            }
            Request::WriteWorkKey { master, slot, key } => {
                let master = self.master_keys.get(&master.index()).ok_or(status::NO_KEY)?;
                let mut clear = Zeroizing::new(key.as_bytes().to_vec());
                crypto::ecb_decrypt(master.as_bytes(), &mut clear)?;
                if !is_des_key_len(clear.len()) {
                    return Err(status::BAD_LENGTH);
                }
                self.work_keys
                    .insert(slot.index(), KeyMaterial::from_slice(&clear));
                Ok(Reply::ok())
            }
            Request::KeyExists { slot } => {
                let exists = self.holds_key(slot);
                Ok(Reply::ok().with_data(vec![u8::from(exists)]))
            }
            Request::EraseKey { slot } => {
                self.erase(slot);
                Ok(Reply::ok())
            }
            Request::DukptWriteTik {
                group,
                source_key,
                key,
                ksn,
                check,
            } => self.write_tik(group, *source_key, key, *ksn, check.as_ref()),
            Request::DukptCipher {
                group,
                variant,
                direction,
                chaining,
                iv,
                data,
            } => {
                if *variant == DukptKeyVariant::Pin
                    && (*chaining != Chaining::Ecb || *direction != CipherDirection::Encrypt)
                {
                    return Err(status::UNSUPPORTED);
                }
                let register = self.register(group)?;
                let key = register.key(*variant);
                let mut out = data.to_vec();
                crypto::apply(&key[..], *chaining, *direction, iv.as_ref(), &mut out)?;
                Ok(Reply::ok().with_data(out).with_ksn(register.ksn()))
            }
            Request::DukptMac {
                group,
                algorithm,
                advance,
                data,
            } => {
                if data.is_empty() {
                    return Err(status::BAD_LENGTH);
                }
                let register = self.register(group)?;
                if *advance {
                    register.advance().ok_or(status::KSN_EXHAUSTED)?;
                }
                let key = register.key(DukptKeyVariant::Mac);
                let mac = match algorithm {
                    MacAlgorithm::Retail => crypto::retail_mac(&key[..], data)?,
                    MacAlgorithm::Cbc => crypto::tdes_cbc_mac(&key[..], data)?,
                };
                Ok(Reply::ok().with_data(mac.to_vec()).with_ksn(register.ksn()))
            }
            Request::DukptPinBlock { group, block } => {
                let register = self.register(group)?;
                let ksn = register.advance().ok_or(status::KSN_EXHAUSTED)?;
                let key = register.key(DukptKeyVariant::Pin);
                let mut out = block.as_bytes().to_vec();
                crypto::ecb_encrypt(&key[..], &mut out)?;
                Ok(Reply::ok().with_data(out).with_ksn(ksn))
            }
            Request::DukptReadKsn { group } => {
                let ksn = self.register(group)?.ksn();
                Ok(Reply::ok().with_ksn(ksn))
            }
            Request::DukptIncreaseKsn { group } => {
                let ksn = self
                    .register(group)?
                    .advance()
                    .ok_or(status::KSN_EXHAUSTED)?;
                Ok(Reply::ok().with_ksn(ksn))
            }
            Request::RsaWrite {
                slot,
                modulus,
                exponent,
                key_info,
            } => {
                if modulus.is_empty() || exponent.is_empty() {
                    return Err(status::BAD_LENGTH);
                }
                self.rsa.insert(
                    slot.index(),
                    RsaRecord {
                        modulus: modulus.clone(),
                        exponent: exponent.clone(),
                        key_info: key_info.clone(),
                    },
                );
                Ok(Reply::ok())
            }
            Request::RsaCompute { slot, .. } => {
                let record = self.rsa.get(&slot.index()).ok_or(status::NO_KEY)?;
                debug!(
                    %slot,
                    modulus_len = record.modulus.len(),
                    exponent_len = record.exponent.len(),
                    info_len = record.key_info.len(),
                    "RSA computation requested without an engine"
                );
                Err(status::ENGINE_UNAVAILABLE)
            }
        }
    }

    fn encrypt_pin_block(&self, slot: &KeySlot, block: &PinBlock) -> Result<Reply, PedStatus> {
        let key = self.work_keys.get(&slot.index()).ok_or(status::NO_KEY)?;
        let mut out = block.as_bytes().to_vec();
        crypto::ecb_encrypt(key.as_bytes(), &mut out)?;
        Ok(Reply::ok().with_data(out))
    }

    fn write_tik(
        &mut self,
        group: &KeySlot,
        source_key: u8,
        key: &KeyMaterial,
        ksn: Ksn,
        check: Option<&[u8; 3]>,
    ) -> Result<Reply, PedStatus> {
        let mut clear = Zeroizing::new(key.as_bytes().to_vec());
        if source_key != 0 {
            let master = self
                .master_keys
                .get(&u16::from(source_key))
                .ok_or(status::NO_KEY)?;
            crypto::ecb_decrypt(master.as_bytes(), &mut clear)?;
        }
        if clear.len() != KEY_LEN {
            return Err(status::BAD_LENGTH);
        }
        if let Some(expected) = check {
            if crypto::kcv(&clear)? != *expected {
                warn!(%group, "Initial key check value mismatch");
                return Err(status::KCV_MISMATCH);
            }
        }

        let mut ipek = Zeroizing::new([0u8; KEY_LEN]);
        ipek.copy_from_slice(&clear);
        self.dukpt
            .insert(group.index(), DukptRegister::new(ipek, ksn));
        Ok(Reply::ok().with_ksn(ksn))
    }

    fn register(&mut self, group: &KeySlot) -> Result<&mut DukptRegister, PedStatus> {
        self.dukpt.get_mut(&group.index()).ok_or(status::NO_KEY)
    }

    fn holds_key(&self, slot: &KeySlot) -> bool {
        let index = slot.index();
        match slot.kind() {
            KeyKind::Master => self.master_keys.contains_key(&index),
            KeyKind::Work => self.work_keys.contains_key(&index),
            KeyKind::DukptGroup => self.dukpt.contains_key(&index),
            KeyKind::Rsa => self.rsa.contains_key(&index),
        }
    }

    fn erase(&mut self, slot: &KeySlot) {
        let index = slot.index();
        let erased = match slot.kind() {
            KeyKind::Master => self.master_keys.remove(&index).is_some(),
            KeyKind::Work => self.work_keys.remove(&index).is_some(),
            KeyKind::DukptGroup => self.dukpt.remove(&index).is_some(),
            KeyKind::Rsa => self.rsa.remove(&index).is_some(),
        };
        debug!(%slot, erased, "Erased key slot");
    }

    fn stop_pending(&mut self) {
        if let Some(run) = self.pending.take() {
            run.stop();
        }
    }
}

/// Whether a device would accept `step` for `request`
///
/// Entries of a length outside the allowed set never leave the device; an
/// empty entry is always delivered as "no PIN".
fn accepts(request: &PinEntryRequest, step: &ScriptStep) -> bool {
    match &step.event {
        PinEvent::Enter(pin) => pin.is_empty() || request.allowed_lengths.contains(&pin.len()),
        _ => true,
    }
}

impl Coprocessor for SoftPed {
    fn do_execute(&mut self, request: &Request) -> Result<Reply, TransportError> {
        self.journal.record(request.name(), request_slot(request));

        if self.faults.transport_failure {
            return Err(TransportError::Connection);
        }
        if let Some(status) = self.faults.reject_requests {
            return Ok(Reply::status(status));
        }

        Ok(self.dispatch(request).unwrap_or_else(Reply::status))
    }

    fn begin_pin_entry(
        &mut self,
        request: &PinEntryRequest,
        events: PinEventSender,
    ) -> Result<PedStatus, TransportError> {
        self.journal.record("begin-pin-entry", None);

        if self.faults.transport_failure {
            return Err(TransportError::Connection);
        }
        if let Some(status) = self.faults.reject_pin_entry {
            return Ok(status);
        }
        if self.pending.as_ref().is_some_and(ScriptRun::is_running) {
            return Ok(status::BUSY);
        }
        self.stop_pending();

        let steps: Vec<ScriptStep> = self
            .script
            .iter()
            .filter(|step| accepts(request, step))
            .cloned()
            .collect();
        debug!(
            steps = steps.len(),
            max_len = request.max_len(),
            "Starting scripted PIN entry"
        );
        self.pending = Some(ScriptRun::spawn(steps, events));

        Ok(PedStatus::OK)
    }

    fn cancel_pin_entry(&mut self) -> Result<PedStatus, TransportError> {
        self.journal.record("cancel-pin-entry", None);

        if self.faults.transport_failure {
            return Err(TransportError::Connection);
        }
        self.stop_pending();
        Ok(PedStatus::OK)
    }
}
