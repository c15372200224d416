//! Configuration for PIN pad sessions

use std::time::Duration;

use pinpad_core::KeySlotRegistry;

/// How long the synchronous capture waits for each key
pub const DEFAULT_KEY_WAIT: Duration = Duration::from_secs(60);

/// Extra time the offline wait allows on top of the device timeout
pub const DEFAULT_OFFLINE_GRACE: Duration = Duration::from_secs(5);

/// Device error code reported while a PIN request is still in progress
pub const DEFAULT_INFORMATIONAL_CODE: i32 = 10;

/// Configuration options for a [`PinPad`](crate::PinPad)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinPadConfig {
    /// Time the synchronous capture waits for each key
    pub key_wait: Duration,

    /// Extra time the offline wait allows past the device timeout
    pub offline_grace: Duration,

    /// Device error code that does not end an offline wait
    pub informational_code: i32,

    /// Key slot ranges
    pub registry: KeySlotRegistry,
}

impl Default for PinPadConfig {
    fn default() -> Self {
        Self {
            key_wait: DEFAULT_KEY_WAIT,
            offline_grace: DEFAULT_OFFLINE_GRACE,
            informational_code: DEFAULT_INFORMATIONAL_CODE,
            registry: KeySlotRegistry::default(),
        }
    }
}

impl PinPadConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-key wait of the synchronous capture
    pub const fn with_key_wait(mut self, wait: Duration) -> Self {
        self.key_wait = wait;
        self
    }

    /// Set the offline wait grace period
    pub const fn with_offline_grace(mut self, grace: Duration) -> Self {
        self.offline_grace = grace;
        self
    }

    /// Set the informational device error code
    pub const fn with_informational_code(mut self, code: i32) -> Self {
        self.informational_code = code;
        self
    }

    /// Set the key slot ranges
    pub const fn with_registry(mut self, registry: KeySlotRegistry) -> Self {
        self.registry = registry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = PinPadConfig::new();
        assert_eq!(config.key_wait, Duration::from_secs(60));
        assert_eq!(config.informational_code, 10);

        let config = config
            .with_key_wait(Duration::from_millis(50))
            .with_offline_grace(Duration::ZERO)
            .with_informational_code(7)
            .with_registry(KeySlotRegistry::new().with_dukpt_groups(2));
        assert_eq!(config.key_wait, Duration::from_millis(50));
        assert_eq!(config.offline_grace, Duration::ZERO);
        assert_eq!(config.informational_code, 7);
        assert!(config.registry.dukpt_group(2).is_err());
    }
}
