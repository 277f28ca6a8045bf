//! Error types for engine lifecycle and configuration.
//!
//! Protocol outcomes (timeouts, framing faults, target rejections, checksum
//! mismatches) are never errors at this level: they are reported through
//! [`ResponseStatus`](crate::ResponseStatus) and a failed
//! [`ProcessStatus`](crate::ProcessStatus). `FwuError` covers misuse of the
//! API and invalid configuration.

use fwu_frame::FrameError;
use thiserror::Error;

use crate::protocol::ObjectType;

/// Errors returned by engine lifecycle and configuration calls
#[derive(Error, Debug)]
pub enum FwuError {
    /// One of the job objects has no bytes
    #[error("The {0} object is empty")]
    EmptyObject(ObjectType),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `exec` called before a successful `init`
    #[error("Engine not initialized: call init() first")]
    NotInitialized,

    /// `exec` called while a run is in progress or after it ended
    #[error("Update already started; call init() to prepare a new run")]
    AlreadyRunning,

    /// A second transaction was started while one is outstanding
    #[error("A transaction is already outstanding")]
    TransactionOutstanding,

    /// A request payload does not fit the fixed request buffer
    #[error("Request payload of {len} bytes exceeds capacity of {capacity} bytes")]
    PayloadTooLarge {
        /// Required payload length
        len: usize,
        /// Buffer capacity
        capacity: usize,
    },

    /// Frame encoding failed
    #[error("Framing error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration could not be parsed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A specialized `Result` type for engine lifecycle calls.
pub type FwuResult<T> = Result<T, FwuError>;

impl From<serde_json::Error> for FwuError {
    fn from(e: serde_json::Error) -> Self {
        FwuError::SerializationError(e.to_string())
    }
}
