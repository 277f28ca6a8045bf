//! Process and response status codes.
//!
//! Both types are `Copy` with a fixed `#[repr(u8)]` representation so they
//! can be stored, compared and logged without allocation.

use core::fmt;

use fwu_frame::FrameError;

/// Overall outcome of an update run, returned on every time advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ProcessStatus {
    /// Still running, or not started.
    #[default]
    Undefined = 0,
    /// The run stopped; see the response status for the cause.
    Failure = 1,
    /// Both objects were delivered and executed.
    Completion = 2,
}

impl ProcessStatus {
    /// Numeric status code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True once the run has stopped, successfully or not.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProcessStatus::Undefined)
    }
}

/// Classification of a failed response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// Malformed or truncated frame; local to one transaction.
    Framing,
    /// No response within the timeout budget.
    Timing,
    /// The response did not belong to the outstanding request.
    Correlation,
    /// The target explicitly rejected the request.
    TargetReported,
    /// An object exceeds a target-declared ceiling.
    SizeLimit,
    /// Checksum or offset verification failed after a chunk.
    Integrity,
}

/// The most specific response status observed during a run.
///
/// Every framing, timing, correlation, size and integrity condition maps to
/// exactly one value.
///
/// # Examples
///
/// ```
/// use fwu_engine::{ResponseStatus, StatusCategory};
///
/// let status = ResponseStatus::ChecksumError;
/// assert_eq!(status.code(), 10);
/// assert_eq!(status.category(), Some(StatusCategory::Integrity));
/// assert_eq!(ResponseStatus::from_code(10), Some(status));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ResponseStatus {
    /// No error so far.
    #[default]
    Ok = 0,
    /// A frame or body was shorter than its layout requires.
    TooShort = 1,
    /// A byte arrived outside a frame.
    StartMarkerMissing = 2,
    /// A response ran past its longest valid length without closing.
    EndMarkerMissing = 3,
    /// The response did not echo the outstanding request.
    RequestReferenceInvalid = 4,
    /// The target rejected the request.
    ErrorResponse = 5,
    /// No response within the timeout budget.
    Timeout = 6,
    /// The ping response carried another id.
    PingIdMismatch = 7,
    /// A response outgrew the receive buffer.
    RxOverflow = 8,
    /// The command object exceeds the target's ceiling.
    CommandObjectTooLarge = 9,
    /// Offset or CRC after a chunk disagreed with what was sent.
    ChecksumError = 10,
    /// The target has no room for the data object.
    DataObjectTooLarge = 11,
    /// An escape byte was followed by an invalid byte.
    RxInvalidEscapeSeq = 12,
}

impl ResponseStatus {
    /// Numeric status code, 0 to 12.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a status by its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ResponseStatus::Ok),
            1 => Some(ResponseStatus::TooShort),
            2 => Some(ResponseStatus::StartMarkerMissing),
            3 => Some(ResponseStatus::EndMarkerMissing),
            4 => Some(ResponseStatus::RequestReferenceInvalid),
            5 => Some(ResponseStatus::ErrorResponse),
            6 => Some(ResponseStatus::Timeout),
            7 => Some(ResponseStatus::PingIdMismatch),
            8 => Some(ResponseStatus::RxOverflow),
            9 => Some(ResponseStatus::CommandObjectTooLarge),
            10 => Some(ResponseStatus::ChecksumError),
            11 => Some(ResponseStatus::DataObjectTooLarge),
            12 => Some(ResponseStatus::RxInvalidEscapeSeq),
            _ => None,
        }
    }

    /// True for [`ResponseStatus::Ok`].
    pub fn is_ok(self) -> bool {
        self == ResponseStatus::Ok
    }

    /// Error class, or `None` for [`ResponseStatus::Ok`].
    pub fn category(self) -> Option<StatusCategory> {
        match self {
            ResponseStatus::Ok => None,
            ResponseStatus::TooShort
            | ResponseStatus::StartMarkerMissing
            | ResponseStatus::EndMarkerMissing
            | ResponseStatus::RxOverflow
            | ResponseStatus::RxInvalidEscapeSeq => Some(StatusCategory::Framing),
            ResponseStatus::Timeout => Some(StatusCategory::Timing),
            ResponseStatus::RequestReferenceInvalid | ResponseStatus::PingIdMismatch => {
                Some(StatusCategory::Correlation)
            }
            ResponseStatus::ErrorResponse => Some(StatusCategory::TargetReported),
            ResponseStatus::CommandObjectTooLarge | ResponseStatus::DataObjectTooLarge => {
                Some(StatusCategory::SizeLimit)
            }
            ResponseStatus::ChecksumError => Some(StatusCategory::Integrity),
        }
    }

    /// Short human-readable description.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Ok => "ok",
            ResponseStatus::TooShort => "response too short",
            ResponseStatus::StartMarkerMissing => "start marker missing",
            ResponseStatus::EndMarkerMissing => "end marker missing",
            ResponseStatus::RequestReferenceInvalid => "request reference invalid",
            ResponseStatus::ErrorResponse => "target reported an error",
            ResponseStatus::Timeout => "response timeout",
            ResponseStatus::PingIdMismatch => "ping id mismatch",
            ResponseStatus::RxOverflow => "receive buffer overflow",
            ResponseStatus::CommandObjectTooLarge => "command object too large",
            ResponseStatus::ChecksumError => "checksum error",
            ResponseStatus::DataObjectTooLarge => "data object too large",
            ResponseStatus::RxInvalidEscapeSeq => "invalid escape sequence",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl From<FrameError> for ResponseStatus {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TooShort { .. } => ResponseStatus::TooShort,
            FrameError::StartMarkerMissing { .. } => ResponseStatus::StartMarkerMissing,
            FrameError::EndMarkerMissing { .. } => ResponseStatus::EndMarkerMissing,
            FrameError::RxOverflow { .. } | FrameError::OutputTooSmall { .. } => {
                ResponseStatus::RxOverflow
            }
            FrameError::InvalidEscape { .. } => ResponseStatus::RxInvalidEscapeSeq,
        }
    }
}
