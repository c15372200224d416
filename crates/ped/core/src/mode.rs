//! PIN block formats supported by the co-processor

use derive_more::Display;

use crate::{Error, Result};

/// Where the PAN segment sits inside the XOR mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskLayout {
    /// 8-byte mask holding the PAN segment
    Short,
    /// 16-byte mask, PAN segment in the first half and zeros after it
    Leading,
    /// 16-byte mask, zeros in the first half and the PAN segment after it
    Trailing,
}

impl MaskLayout {
    /// Length of the mask in bytes
    pub const fn size(&self) -> usize {
        match self {
            Self::Short => 8,
            Self::Leading | Self::Trailing => 16,
        }
    }

    /// Offset of the PAN segment inside the mask
    pub const fn segment_offset(&self) -> usize {
        match self {
            Self::Short | Self::Leading => 0,
            Self::Trailing => 8,
        }
    }
}

/// PIN block format selector
///
/// The discriminant is the mode code used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u8)]
pub enum PinBlockMode {
    /// 8-byte block
    #[display("short (1)")]
    Short = 1,
    /// 16-byte block with the PAN segment leading
    #[display("long (2)")]
    Long = 2,
    /// 8-byte block, alternate cipher selection
    #[display("short-alt (3)")]
    ShortAlt = 3,
    /// 16-byte block with the PAN segment trailing, submitted as [`Self::Long`]
    #[display("long-display (4)")]
    LongDisplay = 4,
    /// 16-byte block with the PAN segment trailing
    #[display("long-trailing (5)")]
    LongTrailing = 5,
}

impl PinBlockMode {
    /// All supported modes
    pub const ALL: [Self; 5] = [
        Self::Short,
        Self::Long,
        Self::ShortAlt,
        Self::LongDisplay,
        Self::LongTrailing,
    ];

    /// Parse a wire mode code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Short),
            2 => Ok(Self::Long),
            3 => Ok(Self::ShortAlt),
            4 => Ok(Self::LongDisplay),
            5 => Ok(Self::LongTrailing),
            other => Err(Error::InvalidMode(other)),
        }
    }

    /// Wire code of this mode
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Layout of the PAN mask for this mode
    pub const fn mask_layout(&self) -> MaskLayout {
        match self {
            Self::Short | Self::ShortAlt => MaskLayout::Short,
            Self::Long => MaskLayout::Leading,
            Self::LongDisplay | Self::LongTrailing => MaskLayout::Trailing,
        }
    }

    /// Length of the PIN block produced in this mode
    pub const fn block_len(&self) -> usize {
        self.mask_layout().size()
    }

    /// Mode identifier sent to the co-processor
    pub const fn submission_mode(&self) -> Self {
        match self {
            Self::LongDisplay => Self::Long,
            other => *other,
        }
    }
}

impl TryFrom<u8> for PinBlockMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code)
    }
}
