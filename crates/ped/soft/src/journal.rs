//! Record of every call that reached the software co-processor

use std::sync::Arc;

use parking_lot::Mutex;
use pinpad_core::KeySlot;

/// A call that reached the co-processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Request name, or `begin-pin-entry` / `cancel-pin-entry`
    pub name: &'static str,
    /// Slot addressed by the request, if any
    pub slot: Option<KeySlot>,
}

/// Shared handle to the call journal
///
/// Clones observe the same journal, so a handle stays usable after the
/// co-processor itself has been moved behind a shared lock.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<JournalEntry>>>);

impl Journal {
    pub(crate) fn record(&self, name: &'static str, slot: Option<KeySlot>) {
        self.0.lock().push(JournalEntry { name, slot });
    }

    /// Number of recorded calls
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether no call was recorded
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Number of recorded calls with the given name
    pub fn count(&self, name: &str) -> usize {
        self.0.lock().iter().filter(|e| e.name == name).count()
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.0.lock().clone()
    }

    /// Forget all entries
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let journal = Journal::default();
        let observer = journal.clone();

        journal.record("key-exists", None);
        journal.record("key-exists", None);
        journal.record("erase-key", None);

        assert_eq!(observer.len(), 3);
        assert_eq!(observer.count("key-exists"), 2);
        assert_eq!(observer.entries()[2].name, "erase-key");

        observer.clear();
        assert!(journal.is_empty());
    }
}
