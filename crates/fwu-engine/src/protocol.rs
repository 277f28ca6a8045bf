//! Bootloader request/response layout.
//!
//! Opcode values belong to the bootloader's protocol version, so they live
//! in a [`ProtocolVersion`] table rather than in the engine. The default
//! table is the Nordic Secure DFU serial protocol (nRF5 SDK 15):
//!
//! - Request: `[opcode, params...]`
//! - Response: `[0x60, echoed opcode, result, body...]`
//! - Result `0x01` is success; `0x0B` carries one extended-error byte
//! - Multi-byte fields are little-endian
//!
//! | Request        | Params              | Response body               |
//! |----------------|---------------------|-----------------------------|
//! | CREATE 0x01    | type, size:u32      | -                           |
//! | SET_PRN 0x02   | interval:u16        | -                           |
//! | CHECKSUM 0x03  | -                   | offset:u32, crc:u32         |
//! | EXECUTE 0x04   | -                   | -                           |
//! | SELECT 0x06    | type                | max_size, offset, crc (u32) |
//! | MTU_GET 0x07   | -                   | mtu:u16                     |
//! | WRITE 0x08     | data...             | none (one-way)              |
//! | PING 0x09      | id                  | id                          |

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FwuError, FwuResult};
use crate::status::ResponseStatus;

/// Response payload buffer size.
pub const RESPONSE_BUF_SIZE: usize = 16;

/// Shortest meaningful response: header, echoed opcode, result.
pub const MIN_RESPONSE_LEN: usize = 3;

/// Largest object chunk carried by one write request.
pub const MAX_CHUNK_LEN: usize = 128;

/// Request payload buffer size: opcode plus one full chunk.
pub const REQUEST_BUF_SIZE: usize = MAX_CHUNK_LEN + 1;

/// Encoded request frame buffer size (worst-case escaping).
pub const REQUEST_FRAME_SIZE: usize = fwu_frame::max_encoded_len(REQUEST_BUF_SIZE);

/// Opcode and code-point table for one bootloader protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolVersion {
    /// Create an object of a given type and size.
    pub op_create: u8,
    /// Set the receipt notification interval.
    pub op_set_prn: u8,
    /// Report offset and CRC of the selected object.
    pub op_calc_checksum: u8,
    /// Execute the selected object.
    pub op_execute: u8,
    /// Select an object type and report its limits.
    pub op_select: u8,
    /// Report the target MTU.
    pub op_get_mtu: u8,
    /// Append data to the selected object.
    pub op_write: u8,
    /// Echo a correlation id.
    pub op_ping: u8,
    /// First byte of every response.
    pub response_header: u8,
    /// Result code of an accepted request.
    pub result_success: u8,
    /// Result code followed by one extended-error byte.
    pub result_extended_error: u8,
    /// Object type code of the command object.
    pub object_command: u8,
    /// Object type code of the data object.
    pub object_data: u8,
}

impl ProtocolVersion {
    /// Nordic Secure DFU over serial, nRF5 SDK 15.
    pub const NORDIC_SDK15: Self = Self {
        op_create: 0x01,
        op_set_prn: 0x02,
        op_calc_checksum: 0x03,
        op_execute: 0x04,
        op_select: 0x06,
        op_get_mtu: 0x07,
        op_write: 0x08,
        op_ping: 0x09,
        response_header: 0x60,
        result_success: 0x01,
        result_extended_error: 0x0B,
        object_command: 0x01,
        object_data: 0x02,
    };
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::NORDIC_SDK15
    }
}

/// The two logical objects of an update job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// Small metadata object (init packet).
    Command,
    /// Firmware image.
    Data,
}

impl ObjectType {
    /// Object type code in `protocol`.
    pub fn code(self, protocol: &ProtocolVersion) -> u8 {
        match self {
            ObjectType::Command => protocol.object_command,
            ObjectType::Data => protocol.object_data,
        }
    }

    /// Status reported when the object exceeds its target ceiling.
    pub fn too_large_status(self) -> ResponseStatus {
        match self {
            ObjectType::Command => ResponseStatus::CommandObjectTooLarge,
            ObjectType::Data => ResponseStatus::DataObjectTooLarge,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Command => write!(f, "command"),
            ObjectType::Data => write!(f, "data"),
        }
    }
}

/// One request to the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'d> {
    /// Liveness check.
    Ping {
        /// Correlation id the target echoes.
        id: u8,
    },
    /// Receipt notification interval; zero disables receipts.
    SetReceiptNotification {
        /// Writes between receipts.
        interval: u16,
    },
    /// Query the target MTU.
    GetMtu,
    /// Select an object type and query its limits.
    Select(ObjectType),
    /// Open a cycle of `size` bytes.
    Create {
        /// Object type of the cycle.
        object: ObjectType,
        /// Cycle length in bytes.
        size: u32,
    },
    /// One chunk of object data; one-way.
    Write(&'d [u8]),
    /// Query offset and CRC of the selected object.
    CalcChecksum,
    /// Execute the current cycle.
    Execute,
}

impl Request<'_> {
    /// Opcode byte of this request in `protocol`.
    pub fn opcode(&self, protocol: &ProtocolVersion) -> u8 {
        match self {
            Request::Ping { .. } => protocol.op_ping,
            Request::SetReceiptNotification { .. } => protocol.op_set_prn,
            Request::GetMtu => protocol.op_get_mtu,
            Request::Select(_) => protocol.op_select,
            Request::Create { .. } => protocol.op_create,
            Request::Write(_) => protocol.op_write,
            Request::CalcChecksum => protocol.op_calc_checksum,
            Request::Execute => protocol.op_execute,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping { .. } => "ping",
            Request::SetReceiptNotification { .. } => "set_prn",
            Request::GetMtu => "get_mtu",
            Request::Select(_) => "select",
            Request::Create { .. } => "create",
            Request::Write(_) => "write",
            Request::CalcChecksum => "calc_checksum",
            Request::Execute => "execute",
        }
    }

    /// Writes are one-way: receipt notifications are disabled, so the
    /// target only answers the checksum request that follows.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Request::Write(_))
    }

    /// Longest valid response payload. A response that runs past it without
    /// a closing marker is reported as missing its end marker.
    pub fn max_response_len(&self) -> usize {
        let body = match self {
            Request::Ping { .. } => 1,
            Request::GetMtu => 2,
            Request::Select(_) => 12,
            Request::CalcChecksum => 8,
            // Room for the extended-error byte of a rejection.
            Request::SetReceiptNotification { .. }
            | Request::Create { .. }
            | Request::Write(_)
            | Request::Execute => 1,
        };
        MIN_RESPONSE_LEN.saturating_add(body)
    }

    /// Copy of the request without the write data, kept for response
    /// validation after the frame has been encoded.
    pub fn without_data(&self) -> Request<'static> {
        match *self {
            Request::Ping { id } => Request::Ping { id },
            Request::SetReceiptNotification { interval } => {
                Request::SetReceiptNotification { interval }
            }
            Request::GetMtu => Request::GetMtu,
            Request::Select(object) => Request::Select(object),
            Request::Create { object, size } => Request::Create { object, size },
            Request::Write(_) => Request::Write(&[]),
            Request::CalcChecksum => Request::CalcChecksum,
            Request::Execute => Request::Execute,
        }
    }

    /// Encode the request payload into `out`, returning its length.
    ///
    /// # Errors
    ///
    /// Returns [`FwuError::PayloadTooLarge`] if `out` is too short.
    pub fn encode(&self, protocol: &ProtocolVersion, out: &mut [u8]) -> FwuResult<usize> {
        let mut writer = PayloadWriter::new(out);
        writer.put(&[self.opcode(protocol)])?;
        match *self {
            Request::Ping { id } => writer.put(&[id])?,
            Request::SetReceiptNotification { interval } => {
                writer.put(&interval.to_le_bytes())?;
            }
            Request::Select(object) => writer.put(&[object.code(protocol)])?,
            Request::Create { object, size } => {
                writer.put(&[object.code(protocol)])?;
                writer.put(&size.to_le_bytes())?;
            }
            Request::Write(data) => writer.put(data)?,
            Request::GetMtu | Request::CalcChecksum | Request::Execute => {}
        }
        Ok(writer.len)
    }
}

struct PayloadWriter<'o> {
    out: &'o mut [u8],
    len: usize,
}

impl<'o> PayloadWriter<'o> {
    fn new(out: &'o mut [u8]) -> Self {
        Self { out, len: 0 }
    }

    fn put(&mut self, bytes: &[u8]) -> FwuResult<()> {
        let end = self.len.saturating_add(bytes.len());
        let capacity = self.out.len();
        let dst = self
            .out
            .get_mut(self.len..end)
            .ok_or(FwuError::PayloadTooLarge { len: end, capacity })?;
        dst.copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }
}

/// A validated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// A one-way request left the host completely.
    Sent,
    /// Success without a body.
    Ack,
    /// Ping echo.
    Ping {
        /// Echoed correlation id.
        id: u8,
    },
    /// Target MTU.
    Mtu {
        /// Largest frame the target accepts, in bytes.
        mtu: u16,
    },
    /// Limits and state of the selected object.
    Select {
        /// Largest object the target accepts in one cycle.
        max_size: u32,
        /// Bytes the target already holds.
        offset: u32,
        /// CRC-32 of those bytes.
        crc: u32,
    },
    /// Offset and CRC after a chunk.
    Checksum {
        /// Bytes the target holds.
        offset: u32,
        /// CRC-32 of those bytes.
        crc: u32,
    },
}

/// Details of a request the target explicitly rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetError {
    /// Opcode of the rejected request.
    pub opcode: u8,
    /// Result code reported by the target.
    pub result: u8,
    /// Extended error code, when the result carries one.
    pub extended: Option<u8>,
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "opcode {:#04x} rejected with result {:#04x}",
            self.opcode, self.result
        )?;
        if let Some(ext) = self.extended {
            write!(f, " (extended error {ext:#04x})")?;
        }
        Ok(())
    }
}

/// Why a response was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Status that ends the run.
    pub status: ResponseStatus,
    /// Target details when the target itself rejected the request.
    pub target: Option<TargetError>,
}

impl From<ResponseStatus> for Rejection {
    fn from(status: ResponseStatus) -> Self {
        Self {
            status,
            target: None,
        }
    }
}

/// Validate `payload` as the response to `request`.
pub fn parse_response(
    request: &Request<'_>,
    payload: &[u8],
    protocol: &ProtocolVersion,
) -> Result<Response, Rejection> {
    let [header, opcode, result, body @ ..] = payload else {
        return Err(ResponseStatus::TooShort.into());
    };

    if *header != protocol.response_header || *opcode != request.opcode(protocol) {
        return Err(ResponseStatus::RequestReferenceInvalid.into());
    }

    if *result != protocol.result_success {
        let extended = if *result == protocol.result_extended_error {
            body.first().copied()
        } else {
            None
        };
        return Err(Rejection {
            status: ResponseStatus::ErrorResponse,
            target: Some(TargetError {
                opcode: *opcode,
                result: *result,
                extended,
            }),
        });
    }

    match *request {
        Request::Ping { id } => {
            let echoed = body.first().copied().ok_or(ResponseStatus::TooShort)?;
            if echoed != id {
                return Err(ResponseStatus::PingIdMismatch.into());
            }
            Ok(Response::Ping { id: echoed })
        }
        Request::GetMtu => Ok(Response::Mtu {
            mtu: u16::from_le_bytes(field(body, 0)?),
        }),
        Request::Select(_) => Ok(Response::Select {
            max_size: u32::from_le_bytes(field(body, 0)?),
            offset: u32::from_le_bytes(field(body, 4)?),
            crc: u32::from_le_bytes(field(body, 8)?),
        }),
        Request::CalcChecksum => Ok(Response::Checksum {
            offset: u32::from_le_bytes(field(body, 0)?),
            crc: u32::from_le_bytes(field(body, 4)?),
        }),
        Request::SetReceiptNotification { .. }
        | Request::Create { .. }
        | Request::Write(_)
        | Request::Execute => Ok(Response::Ack),
    }
}

fn field<const W: usize>(body: &[u8], at: usize) -> Result<[u8; W], Rejection> {
    body.get(at..at.saturating_add(W))
        .and_then(|bytes| <[u8; W]>::try_from(bytes).ok())
        .ok_or_else(|| ResponseStatus::TooShort.into())
}

/// Largest write whose worst-case encoded frame fits the target MTU and the
/// host request buffer.
pub fn chunk_len_for_mtu(mtu: u16) -> usize {
    let payload = usize::from(mtu).saturating_sub(2) / 2;
    payload.saturating_sub(1).min(MAX_CHUNK_LEN)
}
