//! Incremental frame decoding.
//!
//! Bytes are consumed one at a time; a frame may arrive split across any
//! number of deliveries. The decoder keeps only the escape state and the
//! payload accumulated so far in a fixed `N`-byte buffer.

use crate::error::FrameError;
use crate::markers::{END, ESC, ESC_END, ESC_ESC};

/// Result of feeding one byte to a [`FrameDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// More bytes are needed.
    Incomplete,
    /// A frame closed; the payload length is given and the payload is
    /// readable through [`FrameDecoder::payload`] until the next frame opens.
    Complete(usize),
    /// The current frame is malformed and has been dropped.
    Error(FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Idle,
    InFrame,
    Escaped,
}

/// Incremental decoder with an `N`-byte payload buffer.
#[derive(Debug, Clone)]
pub struct FrameDecoder<const N: usize> {
    buf: [u8; N],
    len: usize,
    state: DecodeState,
    min_len: usize,
    max_len: usize,
}

impl<const N: usize> FrameDecoder<N> {
    /// A decoder accepting payloads of 1..=N bytes.
    pub const fn new() -> Self {
        Self {
            buf: [0u8; N],
            len: 0,
            state: DecodeState::Idle,
            min_len: 1,
            max_len: N,
        }
    }

    /// A decoder with the limits of [`set_limits`](Self::set_limits).
    pub fn with_limits(min_len: usize, max_len: usize) -> Self {
        let mut decoder = Self::new();
        decoder.set_limits(min_len, max_len);
        decoder
    }

    /// Set the shortest meaningful payload and the declared maximum.
    ///
    /// The declared maximum is clamped to the buffer capacity.
    pub fn set_limits(&mut self, min_len: usize, max_len: usize) {
        self.min_len = min_len;
        self.max_len = max_len.min(N);
    }

    /// Drop any partial frame and wait for a start marker.
    pub fn reset(&mut self) {
        self.len = 0;
        self.state = DecodeState::Idle;
    }

    /// True when no frame is open.
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Idle
    }

    /// Payload bytes accumulated for the current (or last completed) frame.
    pub fn payload(&self) -> &[u8] {
        self.buf.get(..self.len).unwrap_or(&[])
    }

    /// Consume one wire byte.
    ///
    /// After [`Feed::Error`] the decoder is idle and the partial frame is gone.
    pub fn feed_byte(&mut self, byte: u8) -> Feed {
        match self.state {
            DecodeState::Idle => {
                if byte == END {
                    self.len = 0;
                    self.state = DecodeState::InFrame;
                    Feed::Incomplete
                } else {
                    Feed::Error(FrameError::StartMarkerMissing { byte })
                }
            }
            DecodeState::InFrame => match byte {
                // Back-to-back markers: keep waiting for the first payload byte.
                END if self.len == 0 => Feed::Incomplete,
                END => self.close(),
                ESC => match self.check_room() {
                    Some(err) => self.fail(err),
                    None => {
                        self.state = DecodeState::Escaped;
                        Feed::Incomplete
                    }
                },
                _ => self.push(byte),
            },
            DecodeState::Escaped => match byte {
                ESC_END => self.push(END),
                ESC_ESC => self.push(ESC),
                _ => self.fail(FrameError::InvalidEscape { byte }),
            },
        }
    }

    /// Feed bytes until a frame completes or fails.
    ///
    /// Returns the number of bytes consumed and the last feed result; bytes
    /// after a completed or failed frame are left for the caller.
    pub fn feed(&mut self, bytes: &[u8]) -> (usize, Feed) {
        let mut consumed = 0usize;
        for &byte in bytes {
            consumed = consumed.saturating_add(1);
            match self.feed_byte(byte) {
                Feed::Incomplete => {}
                done => return (consumed, done),
            }
        }
        (consumed, Feed::Incomplete)
    }

    fn check_room(&self) -> Option<FrameError> {
        if self.len >= N {
            Some(FrameError::RxOverflow { capacity: N })
        } else if self.len >= self.max_len {
            Some(FrameError::EndMarkerMissing { max: self.max_len })
        } else {
            None
        }
    }

    fn push(&mut self, byte: u8) -> Feed {
        if let Some(err) = self.check_room() {
            return self.fail(err);
        }
        match self.buf.get_mut(self.len) {
            Some(slot) => {
                *slot = byte;
                self.len = self.len.saturating_add(1);
                self.state = DecodeState::InFrame;
                Feed::Incomplete
            }
            None => self.fail(FrameError::RxOverflow { capacity: N }),
        }
    }

    fn close(&mut self) -> Feed {
        self.state = DecodeState::Idle;
        if self.len < self.min_len {
            return Feed::Error(FrameError::TooShort {
                min: self.min_len,
                actual: self.len,
            });
        }
        Feed::Complete(self.len)
    }

    fn fail(&mut self, err: FrameError) -> Feed {
        self.state = DecodeState::Idle;
        Feed::Error(err)
    }
}

impl<const N: usize> Default for FrameDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}
