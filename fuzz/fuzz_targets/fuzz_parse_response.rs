//! Fuzzes response validation for every request kind.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_parse_response

#![no_main]

use fwu_engine::protocol::parse_response;
use fwu_engine::{ObjectType, ProtocolVersion, Request};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let request = match selector % 8 {
        0 => Request::Ping { id: selector },
        1 => Request::SetReceiptNotification { interval: 0 },
        2 => Request::GetMtu,
        3 => Request::Select(ObjectType::Command),
        4 => Request::Create {
            object: ObjectType::Data,
            size: u32::from(selector),
        },
        5 => Request::Write(&[]),
        6 => Request::CalcChecksum,
        _ => Request::Execute,
    };

    // Must never panic on arbitrary bytes.
    let _ = parse_response(&request, payload, &ProtocolVersion::NORDIC_SDK15);
});
