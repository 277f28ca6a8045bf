//! Frame encoding.
//!
//! A frame is `END, escaped(payload), END`. Every payload byte equal to
//! [`END`] or [`ESC`] is replaced by the two-byte sequence `ESC, ESC_END`
//! or `ESC, ESC_ESC` respectively.

use crate::error::{FrameError, FrameResult};
use crate::markers::{END, ESC, ESC_END, ESC_ESC};

/// Worst-case encoded size of a payload of `payload_len` bytes.
pub const fn max_encoded_len(payload_len: usize) -> usize {
    payload_len.saturating_mul(2).saturating_add(2)
}

/// Escaped literal for a payload byte, if it needs escaping.
fn escaped(byte: u8) -> Option<u8> {
    match byte {
        END => Some(ESC_END),
        ESC => Some(ESC_ESC),
        _ => None,
    }
}

/// Exact encoded size of `payload`, markers included.
pub fn encoded_len(payload: &[u8]) -> usize {
    payload.iter().fold(2usize, |acc, &byte| {
        let width = if escaped(byte).is_some() { 2 } else { 1 };
        acc.saturating_add(width)
    })
}

/// Encode `payload` into `out`, returning the number of bytes written.
///
/// Fails without touching `out` when the encoded frame does not fit.
pub fn encode(payload: &[u8], out: &mut [u8]) -> FrameResult<usize> {
    let needed = encoded_len(payload);
    if out.len() < needed {
        return Err(FrameError::OutputTooSmall {
            needed,
            available: out.len(),
        });
    }

    let mut slots = out.iter_mut();
    let mut put = |byte: u8| {
        if let Some(slot) = slots.next() {
            *slot = byte;
        }
    };

    put(END);
    for &byte in payload {
        match escaped(byte) {
            Some(literal) => {
                put(ESC);
                put(literal);
            }
            None => put(byte),
        }
    }
    put(END);

    Ok(needed)
}

/// A fixed-capacity encoded frame.
///
/// `N` bounds the wire size; a payload whose encoding would exceed it is
/// rejected rather than truncated.
#[derive(Debug, Clone)]
pub struct EncodedFrame<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> EncodedFrame<N> {
    /// An empty frame.
    pub const fn new() -> Self {
        Self {
            buf: [0u8; N],
            len: 0,
        }
    }

    /// Encode `payload` into a new frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::OutputTooSmall`] if the encoding needs more
    /// than `N` bytes.
    pub fn from_payload(payload: &[u8]) -> FrameResult<Self> {
        let mut frame = Self::new();
        frame.set_payload(payload)?;
        Ok(frame)
    }

    /// Replace the frame contents with the encoding of `payload`.
    ///
    /// On error the frame is left empty.
    pub fn set_payload(&mut self, payload: &[u8]) -> FrameResult<usize> {
        self.len = 0;
        self.len = encode(payload, &mut self.buf)?;
        Ok(self.len)
    }

    /// Wire bytes, both markers included.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.get(..self.len).unwrap_or(&[])
    }

    /// Wire length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing has been encoded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop the encoded contents.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for EncodedFrame<N> {
    fn default() -> Self {
        Self::new()
    }
}
