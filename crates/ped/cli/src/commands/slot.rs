use clap::ValueEnum;
use pinpad_core::{KeyKind, KeySlotRegistry};

use crate::display;

/// Key kinds accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SlotKind {
    Master,
    Work,
    Dukpt,
    Rsa,
}

impl From<SlotKind> for KeyKind {
    fn from(kind: SlotKind) -> Self {
        match kind {
            SlotKind::Master => Self::Master,
            SlotKind::Work => Self::Work,
            SlotKind::Dukpt => Self::DukptGroup,
            SlotKind::Rsa => Self::Rsa,
        }
    }
}

/// Validate a slot address against the default ranges
pub(crate) fn slot_command(kind: SlotKind, index: u32) -> anyhow::Result<()> {
    match KeySlotRegistry::new().validate(kind.into(), index) {
        Ok(slot) => {
            println!("{}", display::success(&format!("{slot} is addressable")));
            if let Some(variant) = slot.master_variant() {
                println!("  Variant: {variant:?}");
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", display::failure(&e.to_string(), e.code()));
            Err(e.into())
        }
    }
}
