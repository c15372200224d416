use pinpad_core::Ksn;
use pinpad_session::PinPad;
use pinpad_soft::SoftPed;
use pinpad_soft::dukpt::{KEY_LEN, derive_ipek};
use tracing::debug;

use super::{PinArgs, parse_hex};
use crate::display;

const GROUP: u8 = 0;

/// Inject an initial key derived from a BDK and run `count` PIN transactions
pub(crate) fn dukpt_command(bdk: &str, ksn: &str, count: u32, entry: &PinArgs) -> anyhow::Result<()> {
    let bdk: [u8; KEY_LEN] = parse_hex("BDK", bdk)?
        .try_into()
        .map_err(|_| anyhow::anyhow!("BDK must be {KEY_LEN} bytes"))?;
    let ksn = Ksn::from_slice(&parse_hex("KSN", ksn)?)?;

    let ipek = derive_ipek(&bdk, &ksn);
    let pinpad = PinPad::new(SoftPed::new());
    pinpad.inject_initial_key(GROUP, 0, &ipek[..], ksn.as_bytes(), None)?;
    debug!(%ksn, "Initial key injected");

    println!(
        "{}",
        display::key_value_box(
            "Initial key",
            vec![("IPEK", hex::encode_upper(&ipek[..])), ("KSN", ksn.to_string())],
        )
    );

    for _ in 0..count {
        let out = pinpad.encrypt_pin(GROUP, &entry.pin, &entry.pan, entry.mode)?;
        println!("  {}  {}", out.ksn, hex::encode_upper(&out.data));
    }
    Ok(())
}
