//! The PIN pad facade

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use pinpad_core::coprocessor::KeyMaterial;
use pinpad_core::{
    Coprocessor, Error, KeyKind, KeySlot, Ksn, PanMask, PedStatus, PinBlock, PinBlockMode, Reply,
    Request, Result,
};
use tracing::{Level, debug, warn};

use crate::config::PinPadConfig;
use crate::guard::ActiveSessions;

/// Co-processor handle shared with keypad listeners
pub type SharedCoprocessor<C> = Arc<Mutex<C>>;

/// Gateway between application code, the keypad and the secure co-processor
///
/// Every operation validates its arguments before the co-processor is touched.
/// Clones share the co-processor, the set of active sessions and the DUKPT KSN
/// mirror.
pub struct PinPad<C> {
    pub(crate) ped: SharedCoprocessor<C>,
    pub(crate) config: PinPadConfig,
    pub(crate) sessions: ActiveSessions,
    pub(crate) ksn_mirror: Arc<Mutex<HashMap<u16, Ksn>>>,
}

impl<C> Clone for PinPad<C> {
    fn clone(&self) -> Self {
        Self {
            ped: Arc::clone(&self.ped),
            config: self.config.clone(),
            sessions: self.sessions.clone(),
            ksn_mirror: Arc::clone(&self.ksn_mirror),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for PinPad<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinPad")
            .field("config", &self.config)
            .field("active_sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn log_status(request: &'static str, status: PedStatus) {
    if status.tracing_level() == Level::DEBUG {
        debug!(request, %status, "Co-processor request completed");
    } else {
        warn!(request, %status, "Co-processor refused request");
    }
}

/// Send a request on a shared co-processor and return the reply, whatever its status
pub(crate) fn submit<C: Coprocessor>(ped: &Mutex<C>, request: &Request) -> Result<Reply> {
    let reply = ped.lock().execute(request).map_err(|e| {
        warn!(request = request.name(), error = %e, "Co-processor unreachable");
        Error::from(e)
    })?;
    log_status(request.name(), reply.status);
    Ok(reply)
}

/// Send a request and fail on a non-zero status
pub(crate) fn submit_ok<C: Coprocessor>(ped: &Mutex<C>, request: &Request) -> Result<Reply> {
    let reply = submit(ped, request)?;
    if !reply.is_success() {
        return Err(Error::KeyOperationFailed(reply.status));
    }
    Ok(reply)
}

/// Encipher a PIN block under a work key
///
/// The blank "no PIN" block is returned as zeros without reaching the
/// co-processor.
pub(crate) fn encipher_pin_block<C: Coprocessor>(
    ped: &Mutex<C>,
    slot: KeySlot,
    block: PinBlock,
) -> Result<Bytes> {
    if block.is_blank() {
        debug!(%slot, mode = block.mode().code(), "No PIN entered, returning the zero block");
        return Ok(Bytes::from(vec![0u8; block.size()]));
    }

    let request = Request::EncryptPinBlock {
        slot,
        mode: block.mode().submission_mode(),
        block,
    };
    Ok(submit_ok(ped, &request)?.data)
}

impl<C: Coprocessor> PinPad<C> {
    /// Create a PIN pad with the default configuration
    pub fn new(ped: C) -> Self {
        Self::with_config(ped, PinPadConfig::default())
    }

    /// Create a PIN pad with a custom configuration
    pub fn with_config(ped: C, config: PinPadConfig) -> Self {
        Self::from_shared(Arc::new(Mutex::new(ped)), config)
    }

    /// Create a PIN pad around an already shared co-processor
    pub fn from_shared(ped: SharedCoprocessor<C>, config: PinPadConfig) -> Self {
        Self {
            ped,
            config,
            sessions: ActiveSessions::default(),
            ksn_mirror: Arc::default(),
        }
    }

    /// The shared co-processor handle
    pub fn coprocessor(&self) -> &SharedCoprocessor<C> {
        &self.ped
    }

    /// The active configuration
    pub const fn config(&self) -> &PinPadConfig {
        &self.config
    }

    /// Number of capture sessions in progress
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn work_slot(&self, index: u32) -> Result<KeySlot> {
        self.config.registry.work(index)
    }

    /// Load a clear master key
    pub fn write_master_key(&self, index: u32, key: &[u8]) -> Result<()> {
        let slot = self.config.registry.master(index)?;
        if key.is_empty() {
            return Err(Error::InvalidInput("master key is empty"));
        }
        let request = Request::WriteMasterKey {
            slot,
            key: KeyMaterial::from_slice(key),
        };
        submit_ok(&self.ped, &request)?;
        debug!(%slot, variant = ?slot.master_variant(), "Master key loaded");
        Ok(())
    }

    /// Load a work key enciphered under a master key
    pub fn write_work_key(&self, master: u32, work: u32, key_under_master: &[u8]) -> Result<()> {
        let master = self.config.registry.master(master)?;
        let slot = self.work_slot(work)?;
        if key_under_master.is_empty() {
            return Err(Error::InvalidInput("work key is empty"));
        }
        let request = Request::WriteWorkKey {
            master,
            slot,
            key: KeyMaterial::from_slice(key_under_master),
        };
        submit_ok(&self.ped, &request)?;
        debug!(%slot, %master, "Work key loaded");
        Ok(())
    }

    /// Check whether a slot holds a key
    pub fn key_exists(&self, kind: KeyKind, index: u32) -> Result<bool> {
        let slot = self.config.registry.validate(kind, index)?;
        let reply = submit_ok(&self.ped, &Request::KeyExists { slot })?;
        Ok(reply.data.first().is_some_and(|b| *b != 0))
    }

    /// Erase the key in a slot
    pub fn erase_key(&self, kind: KeyKind, index: u32) -> Result<()> {
        let slot = self.config.registry.validate(kind, index)?;
        submit_ok(&self.ped, &Request::EraseKey { slot })?;
        if kind == KeyKind::DukptGroup {
            self.ksn_mirror.lock().remove(&slot.index());
        }
        Ok(())
    }

    /// Format a known PIN into a block and encipher it under a work key
    ///
    /// An empty `pan` disables PAN masking. An empty `pin` yields the all-zero
    /// "no PIN" block in clear, without a co-processor call.
    pub fn format_pin(&self, work_key: u32, pan: &str, mode: u8, pin: &str) -> Result<Bytes> {
        let slot = self.work_slot(work_key)?;
        let mode = PinBlockMode::from_code(mode)?;
        let mask = PanMask::for_account(pan, mode)?;
        let block = PinBlock::build(pin.as_bytes(), mode, &mask)?;

        encipher_pin_block(&self.ped, slot, block)
    }
}
