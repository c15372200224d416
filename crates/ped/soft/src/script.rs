//! Scripted asynchronous PIN entry

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use pinpad_core::coprocessor::{PinEvent, PinEventSender};
use zeroize::Zeroizing;

/// One scripted cardholder action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// Delay before the event is sent
    pub delay: Duration,
    /// Event to send
    pub event: PinEvent,
}

impl ScriptStep {
    /// An event sent without delay
    pub const fn now(event: PinEvent) -> Self {
        Self {
            delay: Duration::ZERO,
            event,
        }
    }

    /// An event sent after `delay`
    pub const fn after(delay: Duration, event: PinEvent) -> Self {
        Self { delay, event }
    }

    /// The cardholder types `pin` and presses enter
    pub fn enter(pin: &str) -> Vec<Self> {
        let mut steps: Vec<Self> = (1..=pin.len())
            .map(|n| Self::now(PinEvent::KeyClick(n)))
            .collect();
        steps.push(Self::now(PinEvent::Enter(Zeroizing::new(
            pin.as_bytes().to_vec(),
        ))));
        steps
    }
}

/// A running script
#[derive(Debug)]
pub(crate) struct ScriptRun {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

impl ScriptRun {
    /// Replay `steps` on a background thread
    pub(crate) fn spawn(steps: Vec<ScriptStep>, events: PinEventSender) -> Self {
        let (cancel, cancelled) = bounded(1);
        let handle = thread::spawn(move || replay(steps, &events, &cancelled));
        Self { cancel, handle }
    }

    /// Whether the script is still replaying
    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the script and wait for the thread to exit
    pub(crate) fn stop(self) {
        if self.cancel.try_send(()).is_err() {
            tracing::trace!("PIN entry script already finished");
        }
        if self.handle.join().is_err() {
            tracing::warn!("PIN entry script thread panicked");
        }
    }
}

fn replay(steps: Vec<ScriptStep>, events: &PinEventSender, cancelled: &Receiver<()>) {
    for step in steps {
        select! {
            recv(cancelled) -> _ => {
                tracing::debug!("PIN entry script cancelled");
                return;
            }
            default(step.delay) => {}
        }

        if events.send(step.event).is_err() {
            // Nobody is listening any more
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pinpad_core::coprocessor::pin_event_channel;

    use super::*;

    #[test]
    fn test_enter_script() {
        let steps = ScriptStep::enter("12");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].event, PinEvent::KeyClick(2));
        assert!(matches!(&steps[2].event, PinEvent::Enter(pin) if pin.as_slice() == b"12"));
    }

    #[test]
    fn test_replay_and_stop() {
        let (tx, rx) = pin_event_channel();
        let run = ScriptRun::spawn(ScriptStep::enter("1"), tx);
        assert_eq!(rx.recv().unwrap(), PinEvent::KeyClick(1));
        assert!(matches!(rx.recv().unwrap(), PinEvent::Enter(_)));
        run.stop();

        let (tx, rx) = pin_event_channel();
        let run = ScriptRun::spawn(
            vec![ScriptStep::after(Duration::from_secs(30), PinEvent::Timeout)],
            tx,
        );
        assert!(run.is_running());
        let started = Instant::now();
        run.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        // The sender is gone without the delayed event being sent
        assert!(rx.recv().is_err());
    }
}
