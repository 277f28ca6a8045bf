//! Fuzzes the engine with arbitrary bytes from the target.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_engine_rx

#![no_main]

use fwu_engine::{FwuConfig, FwuEngine, UpdateJob};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let command = [0x12u8; 8];
    let firmware = [0xA5u8; 300];
    let job = UpdateJob::new(&command, &firmware);
    let mut engine = FwuEngine::new(job, Vec::new(), FwuConfig::default());
    if engine.init().is_err() || engine.exec().is_err() {
        return;
    }

    // Must never panic, and never send more than granted.
    for chunk in data.chunks(7) {
        engine.transport_mut().clear();
        engine.on_send_budget(32);
        assert!(engine.transport().len() <= 32);
        engine.on_bytes_received(chunk);
        if engine.on_time_advance(100).is_terminal() {
            break;
        }
    }
});
