//! Single request/response exchange.
//!
//! A [`Transaction`] owns the fixed request frame, the send cursor, the
//! response decoder and the timeout budget for exactly one outstanding
//! request. It never blocks: each stimulus (send budget, received bytes,
//! elapsed time) moves it forward by a bounded amount of work.

use fwu_frame::{EncodedFrame, Feed, FrameDecoder};
use tracing::{debug, trace};

use crate::error::{FwuError, FwuResult};
use crate::protocol::{
    MIN_RESPONSE_LEN, ProtocolVersion, REQUEST_BUF_SIZE, REQUEST_FRAME_SIZE, RESPONSE_BUF_SIZE,
    Rejection, Request, Response, parse_response,
};
use crate::status::ResponseStatus;
use crate::transmit::Transmit;

/// Result of a finished transaction.
pub type Outcome = Result<Response, Rejection>;

/// Transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Nothing queued.
    #[default]
    Idle,
    /// Request frame partially handed to the transport.
    Sending,
    /// Request sent; waiting for the response frame.
    AwaitingResponse,
    /// Outcome available through [`Transaction::take_outcome`].
    Resolved,
}

/// The one outstanding request of an update run.
///
/// Resolves exactly once per [`begin`](Self::begin): on a complete response,
/// a framing error, the end of a one-way send, or an exhausted timeout.
#[derive(Debug, Clone)]
pub struct Transaction {
    frame: EncodedFrame<REQUEST_FRAME_SIZE>,
    sent: usize,
    decoder: FrameDecoder<RESPONSE_BUF_SIZE>,
    request: Option<Request<'static>>,
    protocol: ProtocolVersion,
    timeout_remaining_ms: u32,
    outcome: Option<Outcome>,
    last_status: ResponseStatus,
    state: TransactionState,
}

impl Transaction {
    /// An idle transaction.
    pub fn new() -> Self {
        Self {
            frame: EncodedFrame::new(),
            sent: 0,
            decoder: FrameDecoder::new(),
            request: None,
            protocol: ProtocolVersion::default(),
            timeout_remaining_ms: 0,
            outcome: None,
            last_status: ResponseStatus::Ok,
            state: TransactionState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Sending or awaiting a response.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self.state,
            TransactionState::Sending | TransactionState::AwaitingResponse
        )
    }

    /// Status of the most recently resolved transaction, success included.
    pub fn last_status(&self) -> ResponseStatus {
        self.last_status
    }

    /// Encode and queue `request`.
    ///
    /// # Errors
    ///
    /// Returns [`FwuError::TransactionOutstanding`] if a request is still
    /// being sent or awaiting its response, and
    /// [`FwuError::PayloadTooLarge`] if the request does not fit the
    /// request buffer.
    pub fn begin(
        &mut self,
        request: &Request<'_>,
        protocol: &ProtocolVersion,
        timeout_ms: u32,
    ) -> FwuResult<()> {
        if self.is_outstanding() {
            return Err(FwuError::TransactionOutstanding);
        }

        let mut payload = [0u8; REQUEST_BUF_SIZE];
        let len = request.encode(protocol, &mut payload)?;
        let payload = payload.get(..len).unwrap_or(&[]);
        self.frame.set_payload(payload)?;

        self.sent = 0;
        self.decoder.reset();
        self.decoder
            .set_limits(MIN_RESPONSE_LEN, request.max_response_len());
        self.request = Some(request.without_data());
        self.protocol = *protocol;
        self.timeout_remaining_ms = timeout_ms;
        self.outcome = None;
        self.state = TransactionState::Sending;

        debug!(
            request = request.name(),
            frame_len = self.frame.len(),
            expects_response = request.expects_response(),
            "transaction started"
        );
        Ok(())
    }

    /// Hand at most `budget` bytes of the request frame to `tx`.
    ///
    /// Resumes where the previous grant stopped. Returns the number of bytes
    /// sent, which is zero unless a request is being sent.
    pub fn on_send_budget<T: Transmit + ?Sized>(&mut self, budget: usize, tx: &mut T) -> usize {
        if self.state != TransactionState::Sending {
            return 0;
        }

        let remaining = self.frame.as_bytes().get(self.sent..).unwrap_or(&[]);
        let n = budget.min(remaining.len());
        if n > 0
            && let Some(slice) = remaining.get(..n)
        {
            trace!(bytes = n, "transmit");
            tx.send(slice);
            self.sent = self.sent.saturating_add(n);
        }

        if self.sent >= self.frame.len() {
            let expects_response = self
                .request
                .as_ref()
                .is_some_and(Request::expects_response);
            if expects_response {
                self.state = TransactionState::AwaitingResponse;
            } else {
                self.resolve(Ok(Response::Sent));
            }
        }
        n
    }

    /// Feed received bytes to the response decoder.
    ///
    /// Bytes are only consumed while a response is awaited; the rest of a
    /// delivery after the transaction resolves is dropped. Returns the number
    /// of bytes consumed.
    pub fn on_bytes_received(&mut self, bytes: &[u8]) -> usize {
        if self.state != TransactionState::AwaitingResponse {
            if !bytes.is_empty() {
                trace!(bytes = bytes.len(), state = ?self.state, "ignoring unsolicited bytes");
            }
            return 0;
        }

        let (consumed, feed) = self.decoder.feed(bytes);
        match feed {
            Feed::Incomplete => {}
            Feed::Complete(_) => {
                let outcome = match self.request.as_ref() {
                    Some(request) => {
                        parse_response(request, self.decoder.payload(), &self.protocol)
                    }
                    None => Err(ResponseStatus::RequestReferenceInvalid.into()),
                };
                self.resolve(outcome);
            }
            Feed::Error(err) => {
                debug!(error = %err, "response framing failed");
                self.resolve(Err(ResponseStatus::from(err).into()));
            }
        }
        consumed
    }

    /// Charge elapsed time against the timeout budget.
    ///
    /// An exhausted budget always resolves as [`ResponseStatus::Timeout`],
    /// even if part of a response frame has arrived.
    pub fn on_time_advance(&mut self, elapsed_ms: u32) {
        if !self.is_outstanding() {
            return;
        }
        self.timeout_remaining_ms = self.timeout_remaining_ms.saturating_sub(elapsed_ms);
        if self.timeout_remaining_ms == 0 {
            self.resolve(Err(ResponseStatus::Timeout.into()));
        }
    }

    /// Consume the outcome of a resolved transaction, returning to idle.
    pub fn take_outcome(&mut self) -> Option<Outcome> {
        if self.state != TransactionState::Resolved {
            return None;
        }
        self.state = TransactionState::Idle;
        self.outcome.take()
    }

    /// Drop any queued or outstanding request.
    pub fn reset(&mut self) {
        self.frame.clear();
        self.sent = 0;
        self.decoder.reset();
        self.request = None;
        self.timeout_remaining_ms = 0;
        self.outcome = None;
        self.last_status = ResponseStatus::Ok;
        self.state = TransactionState::Idle;
    }

    fn resolve(&mut self, outcome: Outcome) {
        self.last_status = match &outcome {
            Ok(_) => ResponseStatus::Ok,
            Err(rejection) => rejection.status,
        };
        debug!(
            request = self.request.as_ref().map_or("none", Request::name),
            status = %self.last_status,
            "transaction resolved"
        );
        self.outcome = Some(outcome);
        self.state = TransactionState::Resolved;
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
