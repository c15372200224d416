//! Offline PIN entry
//!
//! The co-processor collects the PIN itself and reports progress on a channel.
//! [`OfflinePinWait::run`] blocks on that channel until a terminal event, the
//! local deadline (device timeout plus grace) or a caller cancellation. When the
//! wait ends locally the pending device entry is stopped.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, at, never, select, unbounded};
use parking_lot::Mutex;
use pinpad_core::coprocessor::{PinEntryRequest, PinEvent, PinEventReceiver, pin_event_channel};
use pinpad_core::{Coprocessor, Error, PedStatus, Result};
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::capture::AllowedLengths;
use crate::pinpad::{PinPad, log_status};

/// Parameters of an offline PIN entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflinePinRequest {
    /// Prompt shown by the device
    pub prompt: String,
    /// Accepted PIN lengths
    pub lengths: AllowedLengths,
    /// How long the device waits for the cardholder
    pub timeout: Duration,
}

impl OfflinePinRequest {
    /// Request accepting exactly `lengths`
    pub fn new(prompt: impl Into<String>, lengths: AllowedLengths, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            lengths,
            timeout,
        }
    }

    /// Request accepting `min..=max` digits or no PIN
    pub fn with_range(
        prompt: impl Into<String>,
        min: i32,
        max: i32,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self::new(prompt, AllowedLengths::from_range(min, max)?, timeout))
    }
}

/// PIN collected by the device
#[derive(Clone, PartialEq, Eq)]
pub enum OfflinePin {
    /// Digits entered by the cardholder
    Entered(Zeroizing<Vec<u8>>),
    /// The cardholder confirmed without entering a PIN
    Bypassed,
}

impl fmt::Debug for OfflinePin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entered(pin) => write!(f, "Entered({} digits)", pin.len()),
            Self::Bypassed => f.write_str("Bypassed"),
        }
    }
}

/// Progress of an offline PIN wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflinePinState {
    /// Not started
    #[default]
    Idle,
    /// Request issued, waiting for the device
    AwaitingCallback,
    /// The device delivered an entry
    Succeeded,
    /// The device or the local deadline timed out
    TimedOut,
    /// The device reported an error
    Failed,
    /// The cardholder or the caller cancelled
    Cancelled,
    /// The device refused to start the request
    Rejected,
}

impl OfflinePinState {
    fn after(result: &Result<OfflinePin>) -> Self {
        match result.as_ref().map_err(Error::root) {
            Ok(_) => Self::Succeeded,
            Err(Error::TimedOut) => Self::TimedOut,
            Err(Error::UserCancelled) => Self::Cancelled,
            Err(Error::RequestRejected(_) | Error::Communication(_)) => Self::Rejected,
            Err(_) => Self::Failed,
        }
    }
}

/// Handle for cancelling an offline wait from another thread
#[derive(Debug, Clone)]
pub struct OfflineCanceller {
    cancel: Sender<()>,
    state: Arc<Mutex<OfflinePinState>>,
}

impl OfflineCanceller {
    /// Ask the wait to stop; it returns [`Error::UserCancelled`]
    pub fn cancel(&self) {
        if self.cancel.send(()).is_err() {
            trace!("Offline PIN wait already dropped");
        }
    }

    /// Current state of the wait
    pub fn state(&self) -> OfflinePinState {
        *self.state.lock()
    }
}

/// How the event loop ended
enum Ended {
    Device(Result<OfflinePin>),
    Cancelled,
    Deadline,
}

/// A single offline PIN entry
#[derive(Debug)]
pub struct OfflinePinWait<C> {
    pinpad: PinPad<C>,
    request: OfflinePinRequest,
    cancel_tx: Sender<()>,
    cancel_rx: Receiver<()>,
    state: Arc<Mutex<OfflinePinState>>,
}

impl<C: Coprocessor> PinPad<C> {
    /// Prepare an offline PIN entry; nothing is sent until [`OfflinePinWait::run`]
    pub fn offline_pin_wait(&self, request: OfflinePinRequest) -> OfflinePinWait<C> {
        let (cancel_tx, cancel_rx) = unbounded();
        OfflinePinWait {
            pinpad: self.clone(),
            request,
            cancel_tx,
            cancel_rx,
            state: Arc::default(),
        }
    }

    /// Stop a pending device PIN entry
    pub fn cancel_pin_entry(&self) -> Result<PedStatus> {
        let status = self.ped.lock().cancel_pin_entry().map_err(|e| {
            warn!(error = %e, "Failed to stop PIN entry");
            Error::from(e)
        })?;
        log_status("cancel-pin-entry", status);
        Ok(status)
    }
}

impl<C: Coprocessor> OfflinePinWait<C> {
    /// Handle for cancelling the wait or observing its state
    pub fn canceller(&self) -> OfflineCanceller {
        OfflineCanceller {
            cancel: self.cancel_tx.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Current state of the wait
    pub fn state(&self) -> OfflinePinState {
        *self.state.lock()
    }

    fn set_state(&self, state: OfflinePinState) {
        debug!(?state, "Offline PIN state changed");
        *self.state.lock() = state;
    }

    /// Issue the request and block until it ends
    pub fn run(&mut self) -> Result<OfflinePin> {
        if self.state() != OfflinePinState::Idle {
            return Err(Error::InvalidInput("offline PIN wait already ran"));
        }

        let result = self.start().and_then(|events| self.wait(events));
        self.set_state(OfflinePinState::after(&result));
        result
    }

    fn start(&self) -> Result<PinEventReceiver> {
        let (tx, rx) = pin_event_channel();
        let entry = PinEntryRequest {
            prompt: self.request.prompt.clone(),
            allowed_lengths: self.request.lengths.as_slice().to_vec(),
            timeout: self.request.timeout,
        };

        let status = self
            .pinpad
            .ped
            .lock()
            .begin_pin_entry(&entry, tx)
            .map_err(|e| {
                warn!(error = %e, "Failed to issue offline PIN request");
                Error::from(e)
            })?;
        log_status("begin-pin-entry", status);
        if !status.is_success() {
            return Err(Error::RequestRejected(status));
        }

        self.set_state(OfflinePinState::AwaitingCallback);
        Ok(rx)
    }

    fn wait(&self, events: PinEventReceiver) -> Result<OfflinePin> {
        let deadline = Instant::now()
            .checked_add(self.request.timeout)
            .and_then(|t| t.checked_add(self.pinpad.config.offline_grace));
        if deadline.is_none() {
            debug!(timeout = ?self.request.timeout, "Offline PIN wait has no local deadline");
        }
        let informational = self.pinpad.config.informational_code;

        match wait_events(&events, &self.cancel_rx, deadline, informational) {
            Ended::Device(result) => result,
            Ended::Cancelled => {
                debug!("Offline PIN wait cancelled by caller");
                self.stop_device();
                Err(Error::UserCancelled)
            }
            Ended::Deadline => {
                debug!("Offline PIN wait passed its deadline");
                self.stop_device();
                Err(Error::TimedOut)
            }
        }
    }

    fn stop_device(&self) {
        if let Err(e) = self.pinpad.cancel_pin_entry() {
            debug!(error = %e, "Device entry not stopped");
        }
    }
}

fn wait_events(
    events: &PinEventReceiver,
    cancelled: &Receiver<()>,
    deadline: Option<Instant>,
    informational: i32,
) -> Ended {
    let closed = never();
    let timer = deadline.map_or_else(never, at);
    let mut open = true;

    loop {
        let source = if open { events } else { &closed };
        select! {
            recv(source) -> event => match event {
                Ok(event) => {
                    if let Some(result) = on_event(event, informational) {
                        return Ended::Device(result);
                    }
                }
                Err(_) => {
                    // The device stopped reporting; only the deadline or a cancel ends the wait
                    debug!("PIN event channel closed");
                    open = false;
                }
            },
            recv(cancelled) -> _ => return Ended::Cancelled,
            recv(timer) -> _ => return Ended::Deadline,
        }
    }
}

fn on_event(event: PinEvent, informational: i32) -> Option<Result<OfflinePin>> {
    match event {
        PinEvent::Enter(pin) if pin.is_empty() => Some(Ok(OfflinePin::Bypassed)),
        PinEvent::Enter(pin) => Some(Ok(OfflinePin::Entered(pin))),
        PinEvent::Timeout => Some(Err(Error::TimedOut)),
        PinEvent::Cancel => Some(Err(Error::UserCancelled)),
        PinEvent::Error { code, message } if code == informational => {
            debug!(code, %message, "Informational device message");
            None
        }
        PinEvent::Error { code, message } => Some(Err(Error::DeviceError { code, message })),
        PinEvent::KeyClick(len) => {
            trace!(len, "Key pressed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pinpad_soft::{ScriptStep, SoftPed, status};

    use super::*;
    use crate::config::PinPadConfig;

    fn pinpad(script: Vec<ScriptStep>) -> PinPad<SoftPed> {
        let config = PinPadConfig::new().with_offline_grace(Duration::ZERO);
        PinPad::with_config(SoftPed::new().with_pin_script(script), config)
    }

    fn request(timeout: Duration) -> OfflinePinRequest {
        OfflinePinRequest::new("PIN", AllowedLengths::from_set([4, 6]).unwrap(), timeout)
    }

    #[test]
    fn test_entered_pin() {
        let pinpad = pinpad(ScriptStep::enter("1234"));
        let mut wait = pinpad.offline_pin_wait(request(Duration::from_secs(5)));

        let pin = wait.run().unwrap();
        assert_eq!(pin, OfflinePin::Entered(Zeroizing::new(b"1234".to_vec())));
        assert_eq!(format!("{pin:?}"), "Entered(4 digits)");
        assert_eq!(wait.state(), OfflinePinState::Succeeded);
        assert!(matches!(wait.run(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_informational_error_is_ignored() {
        let pinpad = pinpad(vec![
            ScriptStep::now(PinEvent::Error {
                code: 10,
                message: "enter PIN".to_owned(),
            }),
            ScriptStep::now(PinEvent::Enter(Zeroizing::new(Vec::new()))),
        ]);
        let mut wait = pinpad.offline_pin_wait(request(Duration::from_secs(5)));
        assert_eq!(wait.run().unwrap(), OfflinePin::Bypassed);
    }

    #[test]
    fn test_device_outcomes() {
        let cases = [
            (PinEvent::Timeout, 9, OfflinePinState::TimedOut),
            (PinEvent::Cancel, 2, OfflinePinState::Cancelled),
            (
                PinEvent::Error {
                    code: -3,
                    message: "tamper".to_owned(),
                },
                10,
                OfflinePinState::Failed,
            ),
        ];

        for (event, code, state) in cases {
            let pinpad = pinpad(vec![ScriptStep::now(event)]);
            let mut wait = pinpad.offline_pin_wait(request(Duration::from_secs(5)));
            assert_eq!(wait.run().unwrap_err().code(), code);
            assert_eq!(wait.state(), state);
        }
    }

    #[test]
    fn test_deadline_stops_device() {
        let pinpad = pinpad(Vec::new());
        let journal = pinpad.coprocessor().lock().journal();
        let mut wait = pinpad.offline_pin_wait(request(Duration::from_millis(50)));

        let started = Instant::now();
        assert!(matches!(wait.run(), Err(Error::TimedOut)));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(journal.count("cancel-pin-entry"), 1);
    }

    #[test]
    fn test_caller_cancellation() {
        let pinpad = pinpad(vec![ScriptStep::after(
            Duration::from_secs(30),
            PinEvent::Timeout,
        )]);
        let journal = pinpad.coprocessor().lock().journal();
        let mut wait = pinpad.offline_pin_wait(request(Duration::from_secs(30)));
        let canceller = wait.canceller();

        let waiter = thread::spawn(move || {
            let result = wait.run();
            (result, wait.state())
        });
        while canceller.state() != OfflinePinState::AwaitingCallback {
            thread::sleep(Duration::from_millis(1));
        }
        canceller.cancel();

        let (result, state) = waiter.join().unwrap();
        assert!(matches!(result, Err(Error::UserCancelled)));
        assert_eq!(state, OfflinePinState::Cancelled);
        assert_eq!(journal.count("cancel-pin-entry"), 1);
    }

    #[test]
    fn test_unbounded_timeout_does_not_overflow() {
        let scripted = pinpad(ScriptStep::enter("123456"));
        let mut wait = scripted.offline_pin_wait(request(Duration::MAX));
        assert_eq!(wait.run().unwrap(), OfflinePin::Entered(Zeroizing::new(b"123456".to_vec())));

        let silent = pinpad(Vec::new());
        let journal = silent.coprocessor().lock().journal();
        let mut wait = silent.offline_pin_wait(request(Duration::MAX));
        let canceller = wait.canceller();
        let waiter = thread::spawn(move || wait.run());
        while canceller.state() != OfflinePinState::AwaitingCallback {
            thread::sleep(Duration::from_millis(1));
        }
        canceller.cancel();

        assert!(matches!(waiter.join().unwrap(), Err(Error::UserCancelled)));
        assert_eq!(canceller.state(), OfflinePinState::Cancelled);
        assert_eq!(journal.count("cancel-pin-entry"), 1);
    }

    #[test]
    fn test_rejected_request() {
        let pinpad = pinpad(ScriptStep::enter("1234"));
        pinpad.coprocessor().lock().faults_mut().reject_pin_entry = Some(status::BUSY);

        let mut wait = pinpad.offline_pin_wait(request(Duration::from_secs(5)));
        assert!(matches!(wait.run(), Err(Error::RequestRejected(s)) if s == status::BUSY));
        assert_eq!(wait.state(), OfflinePinState::Rejected);
    }

    #[test]
    fn test_range_form() {
        let request = OfflinePinRequest::with_range("PIN", 4, 20, Duration::from_secs(1)).unwrap();
        assert_eq!(request.lengths.max(), 12);
        assert!(request.lengths.contains(0));
        assert!(OfflinePinRequest::with_range("PIN", -1, 4, Duration::ZERO).is_err());
    }
}
