//! Single-flight tracking of capture sessions

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use pinpad_core::{Error, KeySlot, PinBlockMode, Result};

type SessionKey = (KeySlot, PinBlockMode);

/// The set of key slot and mode pairs with a session in progress
#[derive(Debug, Clone, Default)]
pub(crate) struct ActiveSessions(Arc<Mutex<HashSet<SessionKey>>>);

impl ActiveSessions {
    /// Claim `(slot, mode)` for the lifetime of the returned guard
    pub(crate) fn acquire(&self, slot: KeySlot, mode: PinBlockMode) -> Result<SessionGuard> {
        if !self.0.lock().insert((slot, mode)) {
            tracing::debug!(%slot, %mode, "PIN entry session already active");
            return Err(Error::SessionBusy);
        }
        Ok(SessionGuard {
            sessions: self.clone(),
            key: (slot, mode),
        })
    }

    /// Number of sessions in progress
    pub(crate) fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Releases its slot and mode pair when dropped
#[derive(Debug)]
pub(crate) struct SessionGuard {
    sessions: ActiveSessions,
    key: SessionKey,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.0.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use pinpad_core::KeySlotRegistry;

    use super::*;

    #[test]
    fn test_single_flight() {
        let sessions = ActiveSessions::default();
        let registry = KeySlotRegistry::new();
        let slot = registry.work(1).unwrap();

        let guard = sessions.acquire(slot, PinBlockMode::Short).unwrap();
        assert!(matches!(
            sessions.acquire(slot, PinBlockMode::Short),
            Err(Error::SessionBusy)
        ));

        // Other modes and slots are independent
        let _long = sessions.acquire(slot, PinBlockMode::Long).unwrap();
        let _other = sessions
            .acquire(registry.work(2).unwrap(), PinBlockMode::Short)
            .unwrap();
        assert_eq!(sessions.len(), 3);

        drop(guard);
        assert!(sessions.acquire(slot, PinBlockMode::Short).is_ok());
    }
}
