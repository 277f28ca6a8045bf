//! Escaped, delimited framing for bootloader serial traffic.
//!
//! This crate is intentionally I/O-free and allocation-free. Frames are
//! encoded into and decoded from fixed-capacity buffers sized by const
//! generics, so overflow is always a reported error rather than a
//! reallocation or a silent truncation.
//!
//! # Wire format
//! - `END` (0xC0) opens and closes every frame
//! - `ESC` (0xDB) escapes payload bytes equal to `END` or `ESC`
//! - `ESC ESC_END` (0xDB 0xDC) decodes to 0xC0
//! - `ESC ESC_ESC` (0xDB 0xDD) decodes to 0xDB

#![deny(static_mut_refs)]
#![warn(missing_docs)]

pub mod decode;
pub mod encode;
pub mod error;
pub mod markers;

pub use decode::{Feed, FrameDecoder};
pub use encode::{EncodedFrame, encode, encoded_len, max_encoded_len};
pub use error::{FrameError, FrameResult};
pub use markers::{END, ESC, ESC_END, ESC_ESC};
