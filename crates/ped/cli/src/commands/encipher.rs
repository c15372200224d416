use pinpad_session::PinPad;
use pinpad_soft::SoftPed;
use pinpad_soft::crypto::{ecb_encrypt, kcv};
use tracing::info;

use super::{PinArgs, parse_hex};
use crate::display;

/// Load a master and a work key, then encipher a PIN under the work key
pub(crate) fn encipher_command(
    master_key: &str,
    work_key: &str,
    master_index: u32,
    work_index: u32,
    entry: &PinArgs,
) -> anyhow::Result<()> {
    let master = parse_hex("master key", master_key)?;
    let work = parse_hex("work key", work_key)?;

    let pinpad = PinPad::new(SoftPed::new());
    pinpad.write_master_key(master_index, &master)?;

    let mut under_master = work.clone();
    ecb_encrypt(&master, &mut under_master)
        .map_err(|e| anyhow::anyhow!("cannot encipher work key: {e:?}"))?;
    pinpad.write_work_key(master_index, work_index, &under_master)?;
    info!(master_index, work_index, "Keys loaded");

    let enciphered = pinpad.format_pin(work_index, &entry.pan, entry.mode, &entry.pin)?;
    let check = kcv(&work).map_err(|e| anyhow::anyhow!("cannot compute KCV: {e:?}"))?;

    println!("{}", display::success("PIN block enciphered"));
    println!(
        "{}",
        display::key_value_box(
            "Result",
            vec![
                ("Work key KCV", hex::encode_upper(check)),
                ("Work key under master", hex::encode_upper(&under_master)),
                ("PIN block", hex::encode_upper(&enciphered)),
            ],
        )
    );
    Ok(())
}
