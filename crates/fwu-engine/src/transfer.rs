//! Delivery of one object in create/write/verify/execute cycles.
//!
//! [`ObjectTransfer`] never talks to the transport. It hands out the next
//! [`Request`] and consumes the validated [`Response`] of that request, so the
//! orchestrator can run it one transaction at a time.
//!
//! ```text
//! Select -> Create -> (Write -> Verify)* -> Execute -+-> Done
//!             ^                                      |
//!             +------------ bytes remaining ---------+
//! ```

use core::fmt;

use crc32fast::Hasher;
use tracing::debug;

use crate::protocol::{ObjectType, Request, Response};
use crate::status::ResponseStatus;

/// Where an object transfer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferStep {
    /// Query the target's limits for this object type.
    #[default]
    Select,
    /// Announce the next cycle.
    Create,
    /// Send the next chunk.
    Write,
    /// Cross-check offset and CRC after a chunk.
    Verify,
    /// Finalize the current cycle.
    Execute,
    /// Every cycle executed.
    Done,
}

/// Progress of the object in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Object being delivered.
    pub object: ObjectType,
    /// Bytes handed to the target so far.
    pub offset: usize,
    /// Object length.
    pub total: usize,
}

impl TransferProgress {
    /// Completion in percent, rounded down.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = self.offset.saturating_mul(100) / self.total;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}

/// Cycle bookkeeping for one object.
///
/// Offsets only ever grow: a verified chunk is never sent again, and the
/// running CRC always covers exactly `data[..offset]`.
#[derive(Clone)]
pub struct ObjectTransfer {
    object: ObjectType,
    step: TransferStep,
    total_len: usize,
    chunk_len: usize,
    max_object_size: usize,
    offset: usize,
    cycle_end: usize,
    cycles: u32,
    crc: Hasher,
}

impl ObjectTransfer {
    /// Start a transfer of `total_len` bytes in writes of at most `chunk_len`.
    ///
    /// # Errors
    ///
    /// A zero `chunk_len` means the target announced an MTU too small to
    /// carry any data, reported as [`ResponseStatus::ErrorResponse`].
    pub fn new(
        object: ObjectType,
        total_len: usize,
        chunk_len: usize,
    ) -> Result<Self, ResponseStatus> {
        if chunk_len == 0 {
            return Err(ResponseStatus::ErrorResponse);
        }
        Ok(Self {
            object,
            step: TransferStep::Select,
            total_len,
            chunk_len,
            max_object_size: 0,
            offset: 0,
            cycle_end: 0,
            cycles: 0,
            crc: Hasher::new(),
        })
    }

    /// Object being delivered.
    pub fn object(&self) -> ObjectType {
        self.object
    }

    /// Current step.
    pub fn step(&self) -> TransferStep {
        self.step
    }

    /// True once the last cycle executed.
    pub fn is_done(&self) -> bool {
        self.step == TransferStep::Done
    }

    /// Completed create/execute cycles.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Bytes handed to the target against the object length.
    pub fn progress(&self) -> TransferProgress {
        TransferProgress {
            object: self.object,
            offset: self.offset,
            total: self.total_len,
        }
    }

    /// CRC-32 of every byte sent so far.
    pub fn crc(&self) -> u32 {
        self.crc.clone().finalize()
    }

    /// Request for the current step, borrowing chunk data from `data`.
    ///
    /// Returns `None` once the object is done.
    pub fn next_request<'d>(&self, data: &'d [u8]) -> Option<Request<'d>> {
        match self.step {
            TransferStep::Select => Some(Request::Select(self.object)),
            TransferStep::Create => {
                let size = self.cycle_end.saturating_sub(self.offset);
                Some(Request::Create {
                    object: self.object,
                    size: u32::try_from(size).ok()?,
                })
            }
            TransferStep::Write => Some(Request::Write(self.next_chunk(data))),
            TransferStep::Verify => Some(Request::CalcChecksum),
            TransferStep::Execute => Some(Request::Execute),
            TransferStep::Done => None,
        }
    }

    /// Advance on the validated response to the request from
    /// [`next_request`](Self::next_request).
    ///
    /// # Errors
    ///
    /// Returns the status that ends the run: a too-large status when the
    /// object does not fit the target, [`ResponseStatus::ChecksumError`] when
    /// the target's offset or CRC disagrees with what was sent, and
    /// [`ResponseStatus::RequestReferenceInvalid`] for a response that does
    /// not belong to the current step.
    pub fn on_response(&mut self, data: &[u8], response: Response) -> Result<(), ResponseStatus> {
        match (self.step, response) {
            (TransferStep::Select, Response::Select { max_size, .. }) => {
                self.check_size(max_size)?;
                self.start_cycle();
            }
            (TransferStep::Create, Response::Ack) => self.step = TransferStep::Write,
            (TransferStep::Write, Response::Sent) => {
                let chunk = self.next_chunk(data);
                self.crc.update(chunk);
                self.offset = self.offset.saturating_add(chunk.len());
                self.step = TransferStep::Verify;
            }
            (TransferStep::Verify, Response::Checksum { offset, crc }) => {
                self.verify(offset, crc)?;
                self.step = if self.offset >= self.cycle_end {
                    TransferStep::Execute
                } else {
                    TransferStep::Write
                };
            }
            (TransferStep::Execute, Response::Ack) => {
                self.cycles = self.cycles.saturating_add(1);
                debug!(
                    object = %self.object,
                    cycle = self.cycles,
                    offset = self.offset,
                    "object cycle executed"
                );
                if self.offset >= self.total_len {
                    self.step = TransferStep::Done;
                } else {
                    self.start_cycle();
                }
            }
            _ => return Err(ResponseStatus::RequestReferenceInvalid),
        }
        Ok(())
    }

    fn next_chunk<'d>(&self, data: &'d [u8]) -> &'d [u8] {
        let len = self
            .chunk_len
            .min(self.cycle_end.saturating_sub(self.offset));
        data.get(self.offset..self.offset.saturating_add(len))
            .unwrap_or(&[])
    }

    fn check_size(&mut self, max_size: u32) -> Result<(), ResponseStatus> {
        let max_size = usize::try_from(max_size).unwrap_or(usize::MAX);
        let too_large = u32::try_from(self.total_len).is_err()
            || max_size == 0
            || (self.object == ObjectType::Command && self.total_len > max_size);
        if too_large {
            debug!(
                object = %self.object,
                len = self.total_len,
                max_size,
                "object rejected by size check"
            );
            return Err(self.object.too_large_status());
        }
        self.max_object_size = max_size;
        Ok(())
    }

    fn start_cycle(&mut self) {
        let remaining = self.total_len.saturating_sub(self.offset);
        self.cycle_end = self
            .offset
            .saturating_add(remaining.min(self.max_object_size));
        self.step = TransferStep::Create;
        debug!(
            object = %self.object,
            offset = self.offset,
            size = self.cycle_end.saturating_sub(self.offset),
            "object cycle started"
        );
    }

    fn verify(&self, offset: u32, crc: u32) -> Result<(), ResponseStatus> {
        let expected_crc = self.crc();
        let offset_matches = usize::try_from(offset).is_ok_and(|o| o == self.offset);
        if !offset_matches || crc != expected_crc {
            debug!(
                object = %self.object,
                expected_offset = self.offset,
                offset,
                expected_crc,
                crc,
                "checksum verification failed"
            );
            return Err(ResponseStatus::ChecksumError);
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTransfer")
            .field("object", &self.object)
            .field("step", &self.step)
            .field("offset", &self.offset)
            .field("cycle_end", &self.cycle_end)
            .field("total_len", &self.total_len)
            .field("cycles", &self.cycles)
            .field("crc", &format_args!("{:#010x}", self.crc()))
            .finish()
    }
}
