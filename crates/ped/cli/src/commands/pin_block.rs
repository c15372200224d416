use pinpad_core::{PanMask, PinBlock, PinBlockMode};

use super::PinArgs;
use crate::display;

/// Print the clear PIN block and the PAN mask it was built with
pub(crate) fn pin_block_command(entry: &PinArgs) -> anyhow::Result<()> {
    let mode = PinBlockMode::from_code(entry.mode)?;
    let mask = PanMask::for_account(&entry.pan, mode)?;
    let block = PinBlock::build(entry.pin.as_bytes(), mode, &mask)?;

    println!(
        "{}",
        display::key_value_box(
            "PIN block",
            vec![
                ("Mode", mode.to_string()),
                ("PAN mask", hex::encode_upper(mask.as_bytes())),
                ("Clear block", hex::encode_upper(block.as_bytes())),
            ],
        )
    );
    Ok(())
}
