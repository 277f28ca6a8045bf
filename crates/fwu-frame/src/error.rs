//! Framing error types.

use thiserror::Error;

/// A framing failure detected while encoding or decoding one frame.
///
/// Decoding errors are local to the frame being assembled: the decoder is
/// idle again afterwards and the next start marker begins a fresh frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FrameError {
    /// A frame closed before reaching the shortest meaningful payload
    #[error("Frame too short: expected at least {min} payload bytes, got {actual}")]
    TooShort {
        /// Declared minimum payload length
        min: usize,
        /// Payload bytes received
        actual: usize,
    },

    /// A non-marker byte arrived while no frame was open
    #[error("Start marker missing: byte {byte:#04x} arrived outside a frame")]
    StartMarkerMissing {
        /// The offending byte
        byte: u8,
    },

    /// The payload reached the declared maximum without a closing marker
    #[error("End marker missing: no closing marker after {max} payload bytes")]
    EndMarkerMissing {
        /// Declared maximum payload length
        max: usize,
    },

    /// The payload outgrew the decoder buffer
    #[error("Receive buffer overflow: frame exceeds {capacity} payload bytes")]
    RxOverflow {
        /// Decoder buffer capacity
        capacity: usize,
    },

    /// An escape byte was followed by something other than `ESC_END` or `ESC_ESC`
    #[error("Invalid escape sequence: {byte:#04x} after escape byte")]
    InvalidEscape {
        /// The byte after the escape
        byte: u8,
    },

    /// The encoded frame does not fit the output buffer
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall {
        /// Encoded frame length
        needed: usize,
        /// Output buffer length
        available: usize,
    },
}

/// A specialized `Result` type for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;
