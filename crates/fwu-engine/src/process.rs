//! Top-level update run.
//!
//! [`FwuEngine`] sequences the handshake, the command object and the data
//! object over a single [`Transaction`]. It is driven entirely by the caller:
//!
//! - [`on_time_advance`](FwuEngine::on_time_advance) charges elapsed time,
//!   applies a resolved outcome and starts the next request
//! - [`on_send_budget`](FwuEngine::on_send_budget) hands out request bytes
//! - [`on_bytes_received`](FwuEngine::on_bytes_received) decodes responses
//!
//! Resolved outcomes are applied and the next request queued on the next
//! time advance or send budget, never from inside the receive path.

use tracing::{debug, info, warn};

use crate::config::FwuConfig;
use crate::error::{FwuError, FwuResult};
use crate::protocol::{ObjectType, Request, Response, TargetError, chunk_len_for_mtu};
use crate::status::{ProcessStatus, ResponseStatus};
use crate::transaction::{Outcome, Transaction};
use crate::transfer::{ObjectTransfer, TransferProgress};
use crate::transmit::Transmit;

/// The two objects of one update, borrowed for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateJob<'a> {
    /// Init packet.
    pub command_object: &'a [u8],
    /// Firmware image.
    pub data_object: &'a [u8],
}

impl<'a> UpdateJob<'a> {
    /// Pair an init packet with its firmware image.
    pub fn new(command_object: &'a [u8], data_object: &'a [u8]) -> Self {
        Self {
            command_object,
            data_object,
        }
    }

    /// Bytes of `object`.
    pub fn object(&self, object: ObjectType) -> &'a [u8] {
        match object {
            ObjectType::Command => self.command_object,
            ObjectType::Data => self.data_object,
        }
    }
}

/// Externally visible stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Not started.
    #[default]
    Idle,
    /// Handshake and command object.
    TransferringCommandObject,
    /// Data object, in as many cycles as the target needs.
    TransferringDataObject,
    /// Both objects executed.
    Completed,
    /// Stopped on the response status that caused it.
    Failed,
}

impl Phase {
    /// True while requests are still being exchanged.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Phase::TransferringCommandObject | Phase::TransferringDataObject
        )
    }
}

/// Link setup performed before the command object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Ping,
    DisableReceipts,
    GetMtu,
}

#[derive(Debug, Clone)]
enum Step {
    Handshake(Handshake),
    Transfer(ObjectTransfer),
}

/// Non-blocking firmware update engine.
///
/// # Examples
///
/// ```
/// use fwu_engine::{FwuConfig, FwuEngine, Phase, ProcessStatus, UpdateJob};
///
/// let command = [0x12u8; 8];
/// let firmware = [0xA5u8; 500];
/// let job = UpdateJob::new(&command, &firmware);
///
/// let mut engine = FwuEngine::new(job, Vec::new(), FwuConfig::default());
/// engine.init()?;
/// engine.exec()?;
///
/// // The first request is queued until the next stimulus.
/// assert_eq!(engine.on_time_advance(10), ProcessStatus::Undefined);
/// engine.on_send_budget(64);
/// assert_eq!(engine.transport(), &vec![0xC0, 0x09, 0x01, 0xC0]);
/// assert_eq!(engine.phase(), Phase::TransferringCommandObject);
/// # Ok::<(), fwu_engine::FwuError>(())
/// ```
#[derive(Debug)]
pub struct FwuEngine<'a, T: Transmit> {
    job: UpdateJob<'a>,
    transmit: T,
    config: FwuConfig,
    txn: Transaction,
    phase: Phase,
    step: Option<Step>,
    chunk_len: usize,
    response_status: ResponseStatus,
    target_error: Option<TargetError>,
    initialized: bool,
}

impl<'a, T: Transmit> FwuEngine<'a, T> {
    /// An idle engine; call [`init`](Self::init) before [`exec`](Self::exec).
    pub fn new(job: UpdateJob<'a>, transmit: T, config: FwuConfig) -> Self {
        Self {
            job,
            transmit,
            config,
            txn: Transaction::new(),
            phase: Phase::Idle,
            step: None,
            chunk_len: 0,
            response_status: ResponseStatus::Ok,
            target_error: None,
            initialized: false,
        }
    }

    /// Validate the job and configuration and discard any previous run.
    ///
    /// # Errors
    ///
    /// Returns [`FwuError::EmptyObject`] if either object has no bytes and
    /// [`FwuError::InvalidConfig`] if the configuration fails validation.
    pub fn init(&mut self) -> FwuResult<()> {
        self.initialized = false;
        self.config.validate()?;
        for object in [ObjectType::Command, ObjectType::Data] {
            if self.job.object(object).is_empty() {
                return Err(FwuError::EmptyObject(object));
            }
        }

        self.txn.reset();
        self.phase = Phase::Idle;
        self.step = None;
        self.chunk_len = 0;
        self.response_status = ResponseStatus::Ok;
        self.target_error = None;
        self.initialized = true;
        Ok(())
    }

    /// Start the run. The first request goes out on the next time advance or
    /// send budget.
    ///
    /// # Errors
    ///
    /// Returns [`FwuError::NotInitialized`] without a successful
    /// [`init`](Self::init), and [`FwuError::AlreadyRunning`] if this run
    /// already started.
    pub fn exec(&mut self) -> FwuResult<()> {
        if !self.initialized {
            return Err(FwuError::NotInitialized);
        }
        if self.phase != Phase::Idle {
            return Err(FwuError::AlreadyRunning);
        }

        info!(
            command_len = self.job.command_object.len(),
            data_len = self.job.data_object.len(),
            timeout_ms = self.config.response_timeout_ms,
            "firmware update started"
        );
        self.phase = Phase::TransferringCommandObject;
        self.step = Some(Step::Handshake(Handshake::Ping));
        Ok(())
    }

    /// Charge `elapsed_ms` to the outstanding request, then advance the run.
    ///
    /// Time is charged before the next request is started, so a request
    /// begun by this call gets its full timeout from the next call on. A
    /// driver that only advances time therefore sees the first request time
    /// out one tick after the configured budget.
    ///
    /// Returns the overall status; keep calling until it is terminal.
    pub fn on_time_advance(&mut self, elapsed_ms: u32) -> ProcessStatus {
        if self.phase.is_running() {
            self.txn.on_time_advance(elapsed_ms);
            self.poll();
        }
        self.process_status()
    }

    /// Feed bytes received from the target. Does nothing unless a response
    /// is awaited.
    pub fn on_bytes_received(&mut self, bytes: &[u8]) {
        if self.phase.is_running() {
            self.txn.on_bytes_received(bytes);
        }
    }

    /// Transmit at most `budget` bytes.
    ///
    /// One-way writes resolve as soon as they are sent, so a single grant can
    /// carry a write and the checksum request that follows it.
    pub fn on_send_budget(&mut self, budget: usize) {
        let mut remaining = budget;
        while remaining > 0 && self.phase.is_running() {
            self.poll();
            let sent = self.txn.on_send_budget(remaining, &mut self.transmit);
            if sent == 0 {
                break;
            }
            remaining = remaining.saturating_sub(sent);
        }
    }

    /// Overall status of the run.
    pub fn process_status(&self) -> ProcessStatus {
        match self.phase {
            Phase::Completed => ProcessStatus::Completion,
            Phase::Failed => ProcessStatus::Failure,
            _ => ProcessStatus::Undefined,
        }
    }

    /// Most recent response status; frozen at the cause once the run fails.
    pub fn response_status(&self) -> ResponseStatus {
        self.response_status
    }

    /// Current stage of the run.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Progress of the object transfer in flight, if one has started.
    pub fn progress(&self) -> Option<TransferProgress> {
        match &self.step {
            Some(Step::Transfer(transfer)) => Some(transfer.progress()),
            _ => None,
        }
    }

    /// Details of the last request the target rejected.
    pub fn target_error(&self) -> Option<TargetError> {
        self.target_error
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &FwuConfig {
        &self.config
    }

    /// The transmit sink.
    pub fn transport(&self) -> &T {
        &self.transmit
    }

    /// Mutable access to the transmit sink, e.g. to drain a buffer.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transmit
    }

    /// Consume the engine and return the transmit sink.
    pub fn into_transport(self) -> T {
        self.transmit
    }

    /// Apply a resolved outcome, then start the next request if idle.
    fn poll(&mut self) {
        if let Some(outcome) = self.txn.take_outcome() {
            self.apply(outcome);
        }
        if self.phase.is_running() && !self.txn.is_outstanding() {
            self.begin_next();
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        let response = match outcome {
            Ok(response) => response,
            Err(rejection) => {
                if let Some(target) = rejection.target {
                    self.target_error = Some(target);
                }
                self.fail(rejection.status);
                return;
            }
        };
        self.response_status = ResponseStatus::Ok;

        let result = match self.step.as_mut() {
            Some(Step::Handshake(handshake)) => {
                let handshake = *handshake;
                self.advance_handshake(handshake, response)
            }
            Some(Step::Transfer(transfer)) => {
                let data = self.job.object(transfer.object());
                transfer.on_response(data, response)
            }
            None => Err(ResponseStatus::RequestReferenceInvalid),
        };
        if let Err(status) = result {
            self.fail(status);
            return;
        }

        self.finish_object_if_done();
    }

    fn advance_handshake(
        &mut self,
        handshake: Handshake,
        response: Response,
    ) -> Result<(), ResponseStatus> {
        let next = match (handshake, response) {
            (Handshake::Ping, Response::Ping { .. }) => Step::Handshake(Handshake::DisableReceipts),
            (Handshake::DisableReceipts, Response::Ack) => Step::Handshake(Handshake::GetMtu),
            (Handshake::GetMtu, Response::Mtu { mtu }) => {
                self.chunk_len = chunk_len_for_mtu(mtu);
                debug!(mtu, chunk_len = self.chunk_len, "target mtu received");
                Step::Transfer(self.object_transfer(ObjectType::Command)?)
            }
            _ => return Err(ResponseStatus::RequestReferenceInvalid),
        };
        self.step = Some(next);
        Ok(())
    }

    fn object_transfer(&self, object: ObjectType) -> Result<ObjectTransfer, ResponseStatus> {
        ObjectTransfer::new(object, self.job.object(object).len(), self.chunk_len)
    }

    fn finish_object_if_done(&mut self) {
        let (object, cycles) = match &self.step {
            Some(Step::Transfer(transfer)) if transfer.is_done() => {
                (transfer.object(), transfer.cycles())
            }
            _ => return,
        };

        match object {
            ObjectType::Command => match self.object_transfer(ObjectType::Data) {
                Ok(next) => {
                    self.step = Some(Step::Transfer(next));
                    self.enter(Phase::TransferringDataObject);
                }
                Err(status) => self.fail(status),
            },
            ObjectType::Data => {
                self.enter(Phase::Completed);
                info!(
                    data_len = self.job.data_object.len(),
                    cycles, "firmware update completed"
                );
            }
        }
    }

    fn begin_next(&mut self) {
        let request = match &self.step {
            Some(Step::Handshake(Handshake::Ping)) => Request::Ping {
                id: self.config.ping_id,
            },
            Some(Step::Handshake(Handshake::DisableReceipts)) => {
                Request::SetReceiptNotification { interval: 0 }
            }
            Some(Step::Handshake(Handshake::GetMtu)) => Request::GetMtu,
            Some(Step::Transfer(transfer)) => {
                match transfer.next_request(self.job.object(transfer.object())) {
                    Some(request) => request,
                    None => return,
                }
            }
            None => return,
        };

        if let Err(e) = self.txn.begin(
            &request,
            &self.config.protocol,
            self.config.response_timeout_ms,
        ) {
            warn!(error = %e, request = request.name(), "request could not be queued");
            self.fail(ResponseStatus::RequestReferenceInvalid);
        }
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = ?self.phase, to = ?phase, "update phase changed");
        self.phase = phase;
    }

    fn fail(&mut self, status: ResponseStatus) {
        warn!(
            phase = ?self.phase,
            status = %status,
            target_error = ?self.target_error,
            "firmware update failed"
        );
        self.response_status = status;
        self.phase = Phase::Failed;
        self.txn.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwu_frame::{END, encode, max_encoded_len};
    use tracing_test::traced_test;

    const COMMAND: [u8; 4] = [1, 2, 3, 4];
    const DATA: [u8; 6] = [10, 11, 12, 13, 14, 15];

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; max_encoded_len(payload.len())];
        let len = encode(payload, &mut out).expect("encode failed");
        out.truncate(len);
        out
    }

    fn started() -> FwuEngine<'static, Vec<u8>> {
        let job = UpdateJob::new(&COMMAND, &DATA);
        let mut engine = FwuEngine::new(job, Vec::new(), FwuConfig::default());
        engine.init().expect("init failed");
        engine.exec().expect("exec failed");
        engine
    }

    /// Send the queued request and answer it with `response`.
    fn exchange(engine: &mut FwuEngine<'_, Vec<u8>>, response: &[u8]) -> Vec<u8> {
        engine.on_send_budget(usize::MAX);
        let sent = std::mem::take(engine.transport_mut());
        engine.on_bytes_received(&frame(response));
        engine.on_time_advance(1);
        sent
    }

    #[test]
    fn test_exec_requires_init() {
        let job = UpdateJob::new(&COMMAND, &DATA);
        let mut engine = FwuEngine::new(job, Vec::new(), FwuConfig::default());
        assert!(matches!(engine.exec(), Err(FwuError::NotInitialized)));
    }

    #[test]
    fn test_init_rejects_empty_objects() {
        let job = UpdateJob::new(&COMMAND, &[]);
        let mut engine = FwuEngine::new(job, Vec::new(), FwuConfig::default());
        assert!(matches!(
            engine.init(),
            Err(FwuError::EmptyObject(ObjectType::Data))
        ));
        assert!(matches!(engine.exec(), Err(FwuError::NotInitialized)));
    }

    #[test]
    fn test_init_rejects_zero_timeout() {
        let job = UpdateJob::new(&COMMAND, &DATA);
        let config = FwuConfig::default().with_response_timeout_ms(0);
        let mut engine = FwuEngine::new(job, Vec::new(), config);
        assert!(matches!(engine.init(), Err(FwuError::InvalidConfig(_))));
    }

    #[test]
    fn test_exec_twice_is_rejected() {
        let mut engine = started();
        assert!(matches!(engine.exec(), Err(FwuError::AlreadyRunning)));
    }

    #[test]
    fn test_stimuli_ignored_when_idle() {
        let job = UpdateJob::new(&COMMAND, &DATA);
        let mut engine = FwuEngine::new(job, Vec::new(), FwuConfig::default());
        engine.init().expect("init failed");
        assert_eq!(engine.on_time_advance(100), ProcessStatus::Undefined);
        engine.on_send_budget(64);
        engine.on_bytes_received(&[END, 0x60, END]);
        assert!(engine.transport().is_empty());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_handshake_sequence() {
        let mut engine = started();
        assert_eq!(exchange(&mut engine, &[0x60, 0x09, 0x01, 0x01]), frame(&[0x09, 0x01]));
        assert_eq!(exchange(&mut engine, &[0x60, 0x02, 0x01]), frame(&[0x02, 0x00, 0x00]));
        assert_eq!(exchange(&mut engine, &[0x60, 0x07, 0x01, 0xCC, 0x00]), frame(&[0x07]));

        // Command object select goes out next.
        engine.on_send_budget(usize::MAX);
        assert_eq!(engine.transport(), &frame(&[0x06, 0x01]));
        assert_eq!(
            engine.progress(),
            Some(TransferProgress {
                object: ObjectType::Command,
                offset: 0,
                total: COMMAND.len(),
            })
        );
    }

    #[test]
    fn test_response_applied_only_on_next_stimulus() {
        let mut engine = started();
        engine.on_send_budget(usize::MAX);
        engine.transport_mut().clear();
        engine.on_bytes_received(&frame(&[0x60, 0x09, 0x01, 0x01]));

        // Received but not yet applied: nothing new to send until polled.
        assert!(engine.transport().is_empty());
        engine.on_send_budget(usize::MAX);
        assert_eq!(engine.transport(), &frame(&[0x02, 0x00, 0x00]));
    }

    #[test]
    fn test_small_mtu_fails() {
        let mut engine = started();
        exchange(&mut engine, &[0x60, 0x09, 0x01, 0x01]);
        exchange(&mut engine, &[0x60, 0x02, 0x01]);
        exchange(&mut engine, &[0x60, 0x07, 0x01, 0x04, 0x00]);
        assert_eq!(engine.process_status(), ProcessStatus::Failure);
        assert_eq!(engine.response_status(), ResponseStatus::ErrorResponse);
    }

    #[test]
    fn test_target_rejection_recorded() {
        let mut engine = started();
        exchange(&mut engine, &[0x60, 0x09, 0x0B, 0x03]);
        assert_eq!(engine.phase(), Phase::Failed);
        assert_eq!(engine.response_status(), ResponseStatus::ErrorResponse);
        assert_eq!(
            engine.target_error(),
            Some(TargetError {
                opcode: 0x09,
                result: 0x0B,
                extended: Some(0x03),
            })
        );
    }

    #[test]
    fn test_send_budget_never_exceeded() {
        let mut engine = started();
        engine.on_send_budget(3);
        assert_eq!(engine.transport().len(), 3);
        engine.on_send_budget(3);
        assert_eq!(engine.transport(), &frame(&[0x09, 0x01]));
    }

    #[test]
    fn test_time_is_not_charged_to_request_begun_in_same_call() {
        let mut engine = started();
        // Starts the ping; the 10 ms predate it.
        assert_eq!(engine.on_time_advance(10), ProcessStatus::Undefined);
        assert_eq!(engine.on_time_advance(4999), ProcessStatus::Undefined);
        assert_eq!(engine.on_time_advance(1), ProcessStatus::Failure);
        assert_eq!(engine.response_status(), ResponseStatus::Timeout);
    }

    #[test]
    fn test_open_response_frame_times_out() {
        let mut engine = started();
        engine.on_send_budget(64);
        engine.on_bytes_received(&[END]);
        assert_eq!(engine.on_time_advance(5000), ProcessStatus::Failure);
        assert_eq!(engine.response_status(), ResponseStatus::Timeout);
    }

    #[test]
    #[traced_test]
    fn test_lifecycle_is_logged() {
        let mut engine = started();
        exchange(&mut engine, &[0x60, 0x09, 0x0B, 0x03]);
        assert!(logs_contain("firmware update started"));
        assert!(logs_contain("transaction resolved"));
        assert!(logs_contain("firmware update failed"));
    }
}
