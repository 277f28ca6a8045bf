//! Fuzzes the incremental frame decoder.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_frame_decoder

#![no_main]

use fwu_frame::{Feed, FrameDecoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes, whatever the limits.
    let (limits, wire) = data.split_first().map_or((0, data), |(b, rest)| (*b, rest));
    let mut decoder = FrameDecoder::<16>::with_limits(
        usize::from(limits & 0x0F),
        usize::from(limits >> 4),
    );

    let mut rest = wire;
    while !rest.is_empty() {
        let (consumed, feed) = decoder.feed(rest);
        if let Feed::Complete(len) = feed {
            assert_eq!(decoder.payload().len(), len);
            assert!(len <= 16);
        }
        rest = rest.get(consumed..).unwrap_or_default();
    }
});
