//! The boundary to the secure co-processor
//!
//! The co-processor holds the keys and performs every cryptographic operation.
//! This crate only shapes requests for it and interprets its replies; concrete
//! implementations live outside the core.

pub mod error;
pub mod event;
pub mod request;

use std::fmt;

pub use error::TransportError;
pub use event::{PinEntryRequest, PinEvent, PinEventReceiver, PinEventSender, pin_event_channel};
pub use request::{
    Chaining, CipherDirection, DukptKeyVariant, KCV_LEN, KeyMaterial, MacAlgorithm, Reply,
    Request,
};
use tracing::{debug, trace};

use crate::status::PedStatus;

/// Trait for secure co-processor connections
///
/// Implementations deliver requests and return the raw reply. They do not
/// validate slot ranges or interpret non-zero statuses; both happen in the
/// layers above.
pub trait Coprocessor: Send + fmt::Debug {
    /// Send a request and return the reply
    fn execute(&mut self, request: &Request) -> Result<Reply, TransportError> {
        trace!(request = request.name(), "Executing co-processor request");
        let result = self.do_execute(request);
        match &result {
            Ok(reply) => {
                trace!(
                    request = request.name(),
                    status = %reply.status,
                    len = reply.data.len(),
                    "Received co-processor reply"
                );
            }
            Err(e) => {
                debug!(request = request.name(), error = ?e, "Co-processor call failed");
            }
        }
        result
    }

    /// Internal implementation of execute
    /// This is the method that concrete implementations should override
    fn do_execute(&mut self, request: &Request) -> Result<Reply, TransportError>;

    /// Start an asynchronous PIN request
    ///
    /// Events for the request are sent on `events`. A non-zero status means the
    /// request was not registered and no event will follow.
    fn begin_pin_entry(
        &mut self,
        request: &PinEntryRequest,
        events: PinEventSender,
    ) -> Result<PedStatus, TransportError>;

    /// Stop a pending asynchronous PIN request
    fn cancel_pin_entry(&mut self) -> Result<PedStatus, TransportError>;
}

#[cfg(test)]
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct MockCoprocessor {
    /// Replies to return, in order; the last one repeats
    pub replies: Vec<Reply>,
    /// Requests that were executed
    pub requests: Vec<Request>,
    /// Whether calls fail with a transport error
    pub disconnected: bool,
}

#[cfg(test)]
impl MockCoprocessor {
    /// Create a mock returning the given replies
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            ..Default::default()
        }
    }

    /// Create a mock that always succeeds
    pub fn with_success() -> Self {
        Self::new(vec![Reply::ok()])
    }
}

#[cfg(test)]
impl Coprocessor for MockCoprocessor {
    fn do_execute(&mut self, request: &Request) -> Result<Reply, TransportError> {
        if self.disconnected {
            return Err(TransportError::Connection);
        }

        self.requests.push(request.clone());

        match self.replies.len() {
            0 => Err(TransportError::Transmission),
            1 => Ok(self.replies[0].clone()),
            _ => Ok(self.replies.remove(0)),
        }
    }

    fn begin_pin_entry(
        &mut self,
        _request: &PinEntryRequest,
        events: PinEventSender,
    ) -> Result<PedStatus, TransportError> {
        if self.disconnected {
            return Err(TransportError::Connection);
        }
        drop(events);
        Ok(PedStatus::OK)
    }

    fn cancel_pin_entry(&mut self) -> Result<PedStatus, TransportError> {
        Ok(PedStatus::OK)
    }
}
