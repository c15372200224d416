//! Requests and replies exchanged with the co-processor

use std::fmt;

use bytes::Bytes;
use derive_more::Display;
use zeroize::Zeroizing;

use crate::ksn::Ksn;
use crate::mode::PinBlockMode;
use crate::pin_block::PinBlock;
use crate::slot::KeySlot;
use crate::status::PedStatus;

/// Length of a key check value
pub const KCV_LEN: usize = 3;

/// Clear or enciphered key bytes
///
/// The bytes are wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Zeroizing<Vec<u8>>);

impl KeyMaterial {
    /// Wrap key bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Copy key bytes from a slice
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    /// Key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no key bytes are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.0.len())
    }
}

/// DUKPT key variant selected for a cipher operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[repr(u8)]
pub enum DukptKeyVariant {
    /// Request/response MAC variant
    #[display("MAC")]
    Mac = 0x00,
    /// Data encryption variant
    #[display("data")]
    Data = 0x01,
    /// PIN encryption variant
    #[display("PIN")]
    Pin = 0x02,
}

/// Direction of a cipher operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CipherDirection {
    /// Decipher
    #[display("decrypt")]
    Decrypt,
    /// Encipher
    #[display("encrypt")]
    Encrypt,
}

/// Block chaining used by a cipher operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Chaining {
    /// Electronic code book
    #[display("ECB")]
    Ecb,
    /// Cipher block chaining with an explicit IV
    #[display("CBC")]
    Cbc,
}

impl Chaining {
    /// Wire mode code combining chaining and direction
    pub const fn mode_code(&self, direction: CipherDirection) -> u8 {
        match (self, direction) {
            (Self::Ecb, CipherDirection::Decrypt) => 0x00,
            (Self::Ecb, CipherDirection::Encrypt) => 0x01,
            (Self::Cbc, CipherDirection::Decrypt) => 0x02,
            (Self::Cbc, CipherDirection::Encrypt) => 0x03,
        }
    }
}

/// MAC algorithm for DUKPT MAC computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[repr(u8)]
pub enum MacAlgorithm {
    /// ANSI X9.19 retail MAC
    #[display("retail")]
    Retail = 0x00,
    /// Full triple-DES CBC-MAC
    #[display("cbc")]
    Cbc = 0x01,
}

/// A request sent across the co-processor boundary
#[derive(Debug, Clone)]
pub enum Request {
    /// Encipher a formatted PIN block under a work key
    EncryptPinBlock {
        /// Work key slot
        slot: KeySlot,
        /// Mode identifier as submitted to the device
        mode: PinBlockMode,
        /// Clear PIN block
        block: PinBlock,
    },
    /// Load a clear master key
    WriteMasterKey {
        /// Master key slot
        slot: KeySlot,
        /// Clear key
        key: KeyMaterial,
    },
    /// Load a work key enciphered under a master key
    WriteWorkKey {
        /// Master key the work key is enciphered under
        master: KeySlot,
        /// Work key slot
        slot: KeySlot,
        /// Work key enciphered under `master`
        key: KeyMaterial,
    },
    /// Check whether a slot holds a key
    KeyExists {
        /// Slot to check
        slot: KeySlot,
    },
    /// Erase the key in a slot
    EraseKey {
        /// Slot to erase
        slot: KeySlot,
    },
    /// Inject an initial DUKPT key into a group
    DukptWriteTik {
        /// DUKPT group
        group: KeySlot,
        /// Master key index the key is enciphered under, `0` for a clear key
        source_key: u8,
        /// Initial key
        key: KeyMaterial,
        /// Initial key serial number
        ksn: Ksn,
        /// Expected key check value
        check: Option<[u8; KCV_LEN]>,
    },
    /// DES/3DES under the group's current derived key
    DukptCipher {
        /// DUKPT group
        group: KeySlot,
        /// Key variant
        variant: DukptKeyVariant,
        /// Direction
        direction: CipherDirection,
        /// Chaining
        chaining: Chaining,
        /// IV for CBC
        iv: Option<[u8; 8]>,
        /// Input data, a multiple of 8 bytes
        data: Bytes,
    },
    /// MAC under the group's current derived key
    DukptMac {
        /// DUKPT group
        group: KeySlot,
        /// MAC algorithm
        algorithm: MacAlgorithm,
        /// Advance the KSN before computing
        advance: bool,
        /// Input data
        data: Bytes,
    },
    /// Encipher a PIN block under the group's next PIN key
    DukptPinBlock {
        /// DUKPT group
        group: KeySlot,
        /// Clear PIN block
        block: PinBlock,
    },
    /// Read the group's current KSN
    DukptReadKsn {
        /// DUKPT group
        group: KeySlot,
    },
    /// Advance the group's KSN
    DukptIncreaseKsn {
        /// DUKPT group
        group: KeySlot,
    },
    /// Load an RSA key
    RsaWrite {
        /// RSA slot
        slot: KeySlot,
        /// Modulus
        modulus: Bytes,
        /// Public exponent
        exponent: Bytes,
        /// Opaque key metadata
        key_info: Bytes,
    },
    /// Run a raw RSA operation with a stored key
    RsaCompute {
        /// RSA slot
        slot: KeySlot,
        /// Input data
        data: Bytes,
    },
}

impl Request {
    /// Short name of the request for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EncryptPinBlock { .. } => "encrypt-pin-block",
            Self::WriteMasterKey { .. } => "write-master-key",
            Self::WriteWorkKey { .. } => "write-work-key",
            Self::KeyExists { .. } => "key-exists",
            Self::EraseKey { .. } => "erase-key",
            Self::DukptWriteTik { .. } => "dukpt-write-tik",
            Self::DukptCipher { .. } => "dukpt-cipher",
            Self::DukptMac { .. } => "dukpt-mac",
            Self::DukptPinBlock { .. } => "dukpt-pin-block",
            Self::DukptReadKsn { .. } => "dukpt-read-ksn",
            Self::DukptIncreaseKsn { .. } => "dukpt-increase-ksn",
            Self::RsaWrite { .. } => "rsa-write",
            Self::RsaCompute { .. } => "rsa-compute",
        }
    }
}

/// Reply from the co-processor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// Status of the request
    pub status: PedStatus,
    /// Output data, empty when the request produces none
    pub data: Bytes,
    /// KSN reported by DUKPT operations
    pub ksn: Option<Ksn>,
}

impl Reply {
    /// A successful reply without data
    pub const fn ok() -> Self {
        Self {
            status: PedStatus::OK,
            data: Bytes::new(),
            ksn: None,
        }
    }

    /// A reply carrying only a status
    pub const fn status(status: PedStatus) -> Self {
        Self {
            status,
            data: Bytes::new(),
            ksn: None,
        }
    }

    /// Attach output data
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Attach a KSN
    pub fn with_ksn(mut self, ksn: Ksn) -> Self {
        self.ksn = Some(ksn);
        self
    }

    /// Check if the reply indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
