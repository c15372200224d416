//! End-to-end PIN entry scenarios against the software co-processor

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use hex_literal::hex;
use pinpad_session::prelude::*;
use pinpad_session::{CaptureState, KeyboardListener, KeypadError, OfflinePin, OfflinePinState};
use pinpad_soft::crypto::{ecb_decrypt, ecb_encrypt};
use pinpad_soft::{ScriptStep, SoftPed};
use zeroize::Zeroizing;

const MASTER: [u8; 16] = hex!("0123456789ABCDEFFEDCBA9876543210");
const WORK: [u8; 16] = hex!("89ABCDEF0123456776543210FEDCBA98");
const PAN: &str = "4111111111111111";

fn provisioned() -> PinPad<SoftPed> {
    let pinpad = PinPad::new(SoftPed::new());
    pinpad.write_master_key(1, &MASTER).unwrap();

    let mut under_master = WORK.to_vec();
    ecb_encrypt(&MASTER, &mut under_master).unwrap();
    pinpad.write_work_key(1, 20, &under_master).unwrap();
    pinpad
}

fn decipher(block: &[u8]) -> Vec<u8> {
    let mut clear = block.to_vec();
    ecb_decrypt(&WORK, &mut clear).unwrap();
    clear
}

struct QueuedKeypad(VecDeque<KeyEvent>);

impl Keypad for QueuedKeypad {
    fn clear(&mut self) {}

    fn show_prompt(&mut self, _text: &str) {}

    fn set_key_length(&mut self, _max: usize) {}

    fn wait_key(&mut self, _timeout: Duration) -> KeyEvent {
        self.0.pop_front().unwrap_or(KeyEvent::Timeout)
    }
}

fn typed(pin: &str) -> QueuedKeypad {
    QueuedKeypad(VecDeque::from([KeyEvent::Enter(Zeroizing::new(pin.to_owned()))]))
}

#[derive(Default)]
struct Widget {
    listener: Option<Box<dyn KeyboardListener>>,
}

impl Widget {
    fn enter(&mut self, pin: &str) {
        if let Some(listener) = self.listener.as_mut() {
            listener.handle_event(KeyboardEvent::Enter(Zeroizing::new(pin.to_owned())));
        }
    }
}

impl KeyboardWidget for Widget {
    fn set_key_length(&mut self, _max: usize) {}

    fn show_prompt(&mut self, _text: &str) {}

    fn register_listener(
        &mut self,
        listener: Box<dyn KeyboardListener>,
    ) -> std::result::Result<(), KeypadError> {
        self.listener = Some(listener);
        Ok(())
    }
}

fn widget_request(work_key: u32, lengths: &[usize]) -> WidgetCaptureRequest {
    WidgetCaptureRequest {
        work_key,
        mode: 1,
        account: Some(PAN.to_owned()),
        allowed_lengths: lengths.to_vec(),
        prompt: "Enter PIN".to_owned(),
    }
}

#[test]
fn short_and_long_blocks_differ() {
    let pinpad = provisioned();

    let short = pinpad
        .capture_pin(&mut typed("1234"), &CaptureRequest::new(20, 1, PAN))
        .unwrap();
    let long = pinpad
        .capture_pin(&mut typed("1234"), &CaptureRequest::new(20, 2, PAN))
        .unwrap();

    assert_eq!(short.len(), 8);
    assert_eq!(long.len(), 16);
    assert_ne!(short, long);
    assert_eq!(decipher(&short), hex!("041225EEEEEEEEEE"));
    assert_eq!(decipher(&long), hex!("041225EEEEEEEEEEFFFFFFFFFFFFFFFF"));

    // Same inputs, same block
    let again = pinpad.format_pin(20, PAN, 1, "1234").unwrap();
    assert_eq!(again, short);
}

#[test]
fn empty_pin_is_a_zero_block_in_every_mode() {
    let provisioned = provisioned();
    let bare = PinPad::new(SoftPed::new());

    for pinpad in [&provisioned, &bare] {
        let journal = pinpad.coprocessor().lock().journal();
        journal.clear();

        for code in 1..=5u8 {
            let zeros = vec![0u8; PinBlockMode::from_code(code).unwrap().block_len()];

            let formatted = pinpad.format_pin(20, PAN, code, "").unwrap();
            assert_eq!(formatted.as_ref(), zeros.as_slice(), "mode {code}");

            let captured = pinpad
                .capture_pin(&mut typed(""), &CaptureRequest::new(20, code, PAN))
                .unwrap();
            assert_eq!(captured.as_ref(), zeros.as_slice(), "mode {code}");

            let mut widget = Widget::default();
            let mut request = widget_request(20, &[0, 4]);
            request.mode = code;
            let handle = pinpad.start_capture(&mut widget, request);
            widget.enter("");
            let Some(CaptureEvent::Success(block)) = handle.wait_outcome(Duration::ZERO) else {
                panic!("mode {code}: expected the zero block");
            };
            assert_eq!(block.as_ref(), zeros.as_slice(), "mode {code}");
        }

        assert!(journal.is_empty());
    }
}

#[test]
fn out_of_range_work_key_never_reaches_device() {
    let pinpad = provisioned();
    let journal = pinpad.coprocessor().lock().journal();
    journal.clear();

    let err = pinpad
        .capture_pin(&mut typed("1234"), &CaptureRequest::new(3000, 1, PAN))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidKeySlot { kind: KeyKind::Work, index: 3000 }));

    assert!(matches!(
        pinpad.format_pin(3000, PAN, 1, "1234"),
        Err(Error::InvalidKeySlot { .. })
    ));

    let mut widget = Widget::default();
    let handle = pinpad.start_capture(&mut widget, widget_request(3000, &[4]));
    assert_eq!(handle.state(), CaptureState::Failed(5));

    for index in [992, 999, 1000] {
        assert!(pinpad.key_exists(KeyKind::Master, index).is_err());
    }

    assert!(journal.is_empty());
}

#[test]
fn async_capture_waits_for_an_allowed_length() {
    let pinpad = provisioned();
    let mut widget = Widget::default();
    let handle = pinpad.start_capture(&mut widget, widget_request(20, &[4, 6]));

    widget.enter("12345");
    assert_eq!(handle.state(), CaptureState::AwaitingCallback);
    assert!(handle.wait_outcome(Duration::from_millis(10)).is_none());

    widget.enter("123456");
    let Some(CaptureEvent::Success(block)) = handle.wait_outcome(Duration::ZERO) else {
        panic!("expected a PIN block");
    };
    assert_eq!(decipher(&block), hex!("06122547EEEEEEEE"));
}

#[test]
fn async_capture_from_keypad_thread() {
    let pinpad = provisioned();
    let mut first = Widget::default();
    let mut second = Widget::default();

    let a = pinpad.start_capture(&mut first, widget_request(20, &[4]));
    let mut other_mode = widget_request(20, &[4]);
    other_mode.mode = 2;
    let b = pinpad.start_capture(&mut second, other_mode);
    assert_eq!(pinpad.active_sessions(), 2);

    let keypad = thread::spawn(move || {
        first.enter("1234");
        second.enter("4321");
    });
    keypad.join().unwrap();

    assert!(matches!(a.wait_outcome(Duration::from_secs(1)), Some(CaptureEvent::Success(_))));
    assert!(matches!(b.wait_outcome(Duration::from_secs(1)), Some(CaptureEvent::Success(_))));
    assert_eq!(pinpad.active_sessions(), 0);
}

#[test]
fn offline_wait_is_bounded() {
    let config = PinPadConfig::new().with_offline_grace(Duration::from_millis(20));
    let pinpad = PinPad::with_config(SoftPed::new(), config);
    let lengths = AllowedLengths::from_set([4]).unwrap();
    let mut wait = pinpad.offline_pin_wait(OfflinePinRequest::new(
        "PIN",
        lengths,
        Duration::from_millis(30),
    ));

    let started = Instant::now();
    assert!(matches!(wait.run(), Err(Error::TimedOut)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(5));
    assert_eq!(wait.state(), OfflinePinState::TimedOut);
}

#[test]
fn offline_wait_delivers_scripted_pin() {
    let script = ScriptStep::enter("123456");
    let pinpad = PinPad::new(SoftPed::new().with_pin_script(script));
    let request = OfflinePinRequest::with_range("PIN", 4, 6, Duration::from_secs(5)).unwrap();

    let pin = pinpad.offline_pin_wait(request).run().unwrap();
    assert_eq!(pin, OfflinePin::Entered(Zeroizing::new(b"123456".to_vec())));
}

#[test]
fn ksn_only_increases() {
    let pinpad = provisioned();
    let ksn = hex!("FFFF9876543210E00000");
    let ipek = hex!("6AC292FAA1315B4D858AB3A3D7D5933A");
    pinpad.inject_initial_key(0, 0, &ipek, &ksn, None).unwrap();

    let mut last = Ksn::new(ksn);
    for step in 0..6 {
        let next = match step % 3 {
            0 => pinpad.encrypt_pin(0, "1234", PAN, 1).unwrap().ksn,
            1 => pinpad.increase_ksn(0).unwrap(),
            _ => pinpad.compute_mac(0, b"0123456789", MacAlgorithm::Cbc, true).unwrap().ksn,
        };
        assert!(next > last, "step {step}");
        assert_eq!(pinpad.current_ksn(0).unwrap(), next);
        last = next;
    }

    let out = pinpad
        .compute_des(
            0,
            DukptKeyVariant::Pin,
            None,
            &[0u8; 8],
            CipherDirection::Encrypt,
            Chaining::Ecb,
        )
        .unwrap();
    assert_eq!(out.ksn, last);
    assert_eq!(pinpad.mirrored_ksn(0), Some(last));
    assert_eq!(hex::encode_upper(last.as_bytes()).len(), 20);
}
