//! Marker and escape byte values.

/// Frame delimiter, sent before and after every payload.
pub const END: u8 = 0xC0;
/// Escape byte: the next byte is an escaped literal.
pub const ESC: u8 = 0xDB;
/// Escaped form of [`END`].
pub const ESC_END: u8 = 0xDC;
/// Escaped form of [`ESC`].
pub const ESC_ESC: u8 = 0xDD;
