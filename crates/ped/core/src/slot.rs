//! Key slot addressing and validation
//!
//! The co-processor stores keys in fixed index ranges per key kind. Every request
//! is validated against these ranges here, before anything crosses the boundary.

use derive_more::Display;

use crate::{Error, Result};

/// Highest addressable master key index
pub const MASTER_KEY_MAX_INDEX: u32 = 999;
/// Highest master key index available for general use
pub const MASTER_KEY_MAX_USABLE: u32 = 989;
/// Master key slot holding the fixed 3DES variant
pub const MASTER_KEY_FIXED_3DES: u32 = 990;
/// Master key slot holding the fixed SM4 variant
pub const MASTER_KEY_FIXED_SM4: u32 = 991;
/// Highest work key index
pub const WORK_KEY_MAX_INDEX: u32 = 2999;

/// Default number of DUKPT key groups
pub const DEFAULT_DUKPT_GROUPS: u32 = 10;
/// Default number of RSA key slots
pub const DEFAULT_RSA_SLOTS: u32 = 10;

/// Kind of key held by a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum KeyKind {
    /// Terminal master key
    #[display("master key")]
    Master,
    /// Work key (PIN, MAC or data key) enciphered under a master key
    #[display("work key")]
    Work,
    /// DUKPT key group
    #[display("DUKPT group")]
    DukptGroup,
    /// RSA key
    #[display("RSA key")]
    Rsa,
}

/// Algorithm variant implied by a master key index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterKeyVariant {
    /// General purpose slot
    Standard,
    /// Reserved slot for the fixed 3DES key
    Fixed3Des,
    /// Reserved slot for the fixed SM4 key
    FixedSm4,
}

/// A validated key slot address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{kind} #{index}")]
pub struct KeySlot {
    kind: KeyKind,
    index: u16,
}

impl KeySlot {
    /// Kind of key stored in this slot
    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Slot index
    pub const fn index(&self) -> u16 {
        self.index
    }

    /// Master key variant, for master key slots
    pub const fn master_variant(&self) -> Option<MasterKeyVariant> {
        match self.kind {
            KeyKind::Master => Some(match self.index as u32 {
                MASTER_KEY_FIXED_3DES => MasterKeyVariant::Fixed3Des,
                MASTER_KEY_FIXED_SM4 => MasterKeyVariant::FixedSm4,
                _ => MasterKeyVariant::Standard,
            }),
            _ => None,
        }
    }
}

/// Validates key slot indices against the configured ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlotRegistry {
    dukpt_groups: u32,
    rsa_slots: u32,
}

impl Default for KeySlotRegistry {
    fn default() -> Self {
        Self {
            dukpt_groups: DEFAULT_DUKPT_GROUPS,
            rsa_slots: DEFAULT_RSA_SLOTS,
        }
    }
}

impl KeySlotRegistry {
    /// Create a registry with the default ranges
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of DUKPT groups (group identifiers are one byte wide)
    pub const fn with_dukpt_groups(mut self, groups: u8) -> Self {
        self.dukpt_groups = groups as u32;
        self
    }

    /// Set the number of RSA key slots
    pub const fn with_rsa_slots(mut self, slots: u16) -> Self {
        self.rsa_slots = slots as u32;
        self
    }

    /// Validate `index` for `kind` and return the slot address
    pub fn validate(&self, kind: KeyKind, index: u32) -> Result<KeySlot> {
        let valid = match kind {
            KeyKind::Master => {
                index <= MASTER_KEY_MAX_USABLE
                    || index == MASTER_KEY_FIXED_3DES
                    || index == MASTER_KEY_FIXED_SM4
            }
            KeyKind::Work => index <= WORK_KEY_MAX_INDEX,
            KeyKind::DukptGroup => index < self.dukpt_groups,
            KeyKind::Rsa => index < self.rsa_slots,
        };

        if !valid {
            tracing::debug!(%kind, index, "Rejected key slot");
            return Err(Error::invalid_slot(kind, index));
        }

        Ok(KeySlot {
            kind,
            index: index as u16,
        })
    }

    /// Validate a master key index
    pub fn master(&self, index: u32) -> Result<KeySlot> {
        self.validate(KeyKind::Master, index)
    }

    /// Validate a work key index
    pub fn work(&self, index: u32) -> Result<KeySlot> {
        self.validate(KeyKind::Work, index)
    }

    /// Validate a DUKPT group index
    pub fn dukpt_group(&self, group: u8) -> Result<KeySlot> {
        self.validate(KeyKind::DukptGroup, group as u32)
    }

    /// Validate an RSA key index
    pub fn rsa(&self, index: u32) -> Result<KeySlot> {
        self.validate(KeyKind::Rsa, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_ranges() {
        let registry = KeySlotRegistry::new();

        assert!(registry.master(0).is_ok());
        assert!(registry.master(989).is_ok());
        assert_eq!(
            registry.master(990).unwrap().master_variant(),
            Some(MasterKeyVariant::Fixed3Des)
        );
        assert_eq!(
            registry.master(991).unwrap().master_variant(),
            Some(MasterKeyVariant::FixedSm4)
        );

        for index in 992..=1000 {
            assert!(
                matches!(
                    registry.master(index),
                    Err(Error::InvalidKeySlot { kind: KeyKind::Master, .. })
                ),
                "index {index} should be rejected"
            );
        }
    }

    #[test]
    fn test_work_key_ranges() {
        let registry = KeySlotRegistry::new();

        let slot = registry.work(2999).unwrap();
        assert_eq!(slot.kind(), KeyKind::Work);
        assert_eq!(slot.index(), 2999);
        assert_eq!(slot.master_variant(), None);

        let err = registry.work(3000).unwrap_err();
        assert_eq!(err.code(), 5);
    }

    #[test]
    fn test_configurable_ranges() {
        let registry = KeySlotRegistry::new()
            .with_dukpt_groups(2)
            .with_rsa_slots(4);

        assert!(registry.dukpt_group(1).is_ok());
        assert!(registry.dukpt_group(2).is_err());
        assert!(registry.rsa(3).is_ok());
        assert!(registry.rsa(4).is_err());
    }

    #[test]
    fn test_slot_display() {
        let slot = KeySlotRegistry::new().work(12).unwrap();
        assert_eq!(slot.to_string(), "work key #12");
    }
}
