//! Asynchronous PIN capture on a keyboard widget

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use pinpad_core::{
    Coprocessor, Error, KeySlot, PanMask, PinBlock, PinBlockMode, Result,
};
use tracing::{debug, trace, warn};

use super::AllowedLengths;
use crate::guard::SessionGuard;
use crate::keypad::{KeyboardEvent, KeyboardWidget};
use crate::pinpad::{PinPad, SharedCoprocessor, encipher_pin_block};

/// Parameters of an asynchronous PIN capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetCaptureRequest {
    /// Work key index the PIN block is enciphered under
    pub work_key: u32,
    /// PIN block mode code
    pub mode: u8,
    /// Primary account number; an empty string disables PAN masking
    pub account: Option<String>,
    /// Accepted PIN lengths
    pub allowed_lengths: Vec<usize>,
    /// Prompt shown on the widget
    pub prompt: String,
}

/// Event delivered on a [`CaptureHandle`]
#[derive(Debug)]
pub enum CaptureEvent {
    /// The enciphered PIN block
    Success(Bytes),
    /// The session failed
    Error(Error),
    /// The cardholder pressed cancel
    Cancelled,
    /// Number of digits entered so far
    InputEcho(usize),
}

impl CaptureEvent {
    /// Whether this event ends the session
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::InputEcho(_))
    }
}

/// Lifecycle of an asynchronous capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the widget to report an accepted entry or cancel
    AwaitingCallback,
    /// A PIN block was produced
    Succeeded,
    /// The session ended with the given outcome code
    Failed(i32),
    /// The cardholder cancelled
    Cancelled,
}

#[derive(Debug)]
struct SessionState {
    state: CaptureState,
    prompt: Option<String>,
}

type SharedState = Arc<Mutex<SessionState>>;

/// Record a terminal event and forward it, unless one was already delivered
fn complete(shared: &SharedState, events: &Sender<CaptureEvent>, event: CaptureEvent) {
    let state = match &event {
        CaptureEvent::Success(_) => CaptureState::Succeeded,
        CaptureEvent::Cancelled => CaptureState::Cancelled,
        CaptureEvent::Error(e) => CaptureState::Failed(e.code()),
        CaptureEvent::InputEcho(_) => return,
    };

    {
        let mut session = shared.lock();
        if session.state != CaptureState::AwaitingCallback {
            return;
        }
        session.state = state;
        // The prompt stays up after an error so the terminal can show it
        if !matches!(state, CaptureState::Failed(_)) {
            session.prompt = None;
        }
    }

    debug!(?state, "PIN capture finished");
    if events.send(event).is_err() {
        trace!("Capture handle dropped before completion");
    }
}

/// Caller's view of an asynchronous capture
#[derive(Debug)]
pub struct CaptureHandle {
    events: Receiver<CaptureEvent>,
    shared: SharedState,
}

impl CaptureHandle {
    /// Channel delivering input echoes and exactly one terminal event
    pub const fn events(&self) -> &Receiver<CaptureEvent> {
        &self.events
    }

    /// Current session state
    pub fn state(&self) -> CaptureState {
        self.shared.lock().state
    }

    /// Prompt currently owned by the session, if it has not been cleared
    pub fn prompt(&self) -> Option<String> {
        self.shared.lock().prompt.clone()
    }

    /// Wait up to `timeout` for the terminal event, skipping input echoes
    pub fn wait_outcome(&self, timeout: Duration) -> Option<CaptureEvent> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let next = match deadline {
                Some(deadline) => self.events.recv_deadline(deadline),
                None => self.events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(event) if event.is_terminal() => return Some(event),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// Listener state moved into the widget
struct WidgetSession<C> {
    ped: SharedCoprocessor<C>,
    slot: KeySlot,
    mode: PinBlockMode,
    mask: PanMask,
    lengths: AllowedLengths,
    events: Sender<CaptureEvent>,
    shared: SharedState,
    guard: Option<SessionGuard>,
}

impl<C: Coprocessor> WidgetSession<C> {
    fn handle(&mut self, event: KeyboardEvent) {
        if self.guard.is_none() {
            trace!("Keyboard event after completion ignored");
            return;
        }

        match event {
            KeyboardEvent::Enter(pin) if self.lengths.contains(pin.len()) => {
                let outcome = PinBlock::build(pin.as_bytes(), self.mode, &self.mask)
                    .and_then(|block| encipher_pin_block(&self.ped, self.slot, block));
                match outcome {
                    Ok(data) => self.finish(CaptureEvent::Success(data)),
                    Err(e) => {
                        warn!(error = %e, "PIN block encipherment failed");
                        self.finish(CaptureEvent::Error(e));
                    }
                }
            }
            KeyboardEvent::Enter(pin) => {
                debug!(len = pin.len(), "PIN length not allowed, still waiting");
            }
            KeyboardEvent::Cancel => self.finish(CaptureEvent::Cancelled),
            KeyboardEvent::Key(len) if len <= self.lengths.max() => {
                if self.events.send(CaptureEvent::InputEcho(len)).is_err() {
                    trace!(len, "Capture handle dropped, echo discarded");
                }
            }
            KeyboardEvent::Key(len) => trace!(len, "Digit beyond the longest PIN"),
        }
    }

    fn finish(&mut self, event: CaptureEvent) {
        complete(&self.shared, &self.events, event);
        self.guard = None;
    }
}

/// Everything checked before the widget is touched
struct Prepared {
    slot: KeySlot,
    mode: PinBlockMode,
    mask: PanMask,
    lengths: AllowedLengths,
    guard: SessionGuard,
}

impl<C: Coprocessor + 'static> PinPad<C> {
    /// Start a PIN capture on a keyboard widget
    ///
    /// Never fails at the call site: validation and setup errors arrive as the
    /// terminal event on the returned handle.
    pub fn start_capture<W>(&self, widget: &mut W, request: WidgetCaptureRequest) -> CaptureHandle
    where
        W: KeyboardWidget + ?Sized,
    {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Mutex::new(SessionState {
            state: CaptureState::AwaitingCallback,
            prompt: Some(request.prompt.clone()),
        }));
        let handle = CaptureHandle {
            events: rx,
            shared: Arc::clone(&shared),
        };

        let prepared = match self.prepare_capture(&request) {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!(error = %e, "PIN capture rejected");
                complete(&shared, &tx, CaptureEvent::Error(e));
                return handle;
            }
        };

        widget.set_key_length(prepared.lengths.max());
        widget.show_prompt(&request.prompt);

        let mut session = WidgetSession {
            ped: Arc::clone(&self.ped),
            slot: prepared.slot,
            mode: prepared.mode,
            mask: prepared.mask,
            lengths: prepared.lengths,
            events: tx.clone(),
            shared: Arc::clone(&shared),
            guard: Some(prepared.guard),
        };

        let listener = Box::new(move |event: KeyboardEvent| session.handle(event));
        if let Err(e) = widget.register_listener(listener) {
            warn!(error = %e, "Keyboard listener registration failed");
            complete(&shared, &tx, CaptureEvent::Error(Error::SetupFailed(e.0)));
        }
        handle
    }

    fn prepare_capture(&self, request: &WidgetCaptureRequest) -> Result<Prepared> {
        let account = request
            .account
            .as_deref()
            .ok_or(Error::InvalidInput("account number is missing"))?;
        let slot = self.work_slot(request.work_key)?;
        let mode = PinBlockMode::from_code(request.mode)?;
        let mask = PanMask::for_account(account, mode)?;
        let lengths = AllowedLengths::from_set(request.allowed_lengths.iter().copied())?;
        let guard = self.sessions.acquire(slot, mode)?;

        Ok(Prepared {
            slot,
            mode,
            mask,
            lengths,
            guard,
        })
    }
}
