//! Property-based tests for frame encoding and decoding.

use fwu_frame::{END, ESC, EncodedFrame, Feed, FrameDecoder, encode, max_encoded_len};
use proptest::prelude::*;

const CAPACITY: usize = 64;

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    // Bias towards marker and escape bytes so escaping is exercised often.
    let byte = prop_oneof![
        3 => any::<u8>(),
        1 => Just(END),
        1 => Just(ESC),
    ];
    prop::collection::vec(byte, 1..=CAPACITY)
}

fn encode_vec(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; max_encoded_len(payload.len())];
    let len = encode(payload, &mut out).expect("worst-case buffer always fits");
    out.truncate(len);
    out
}

fn decode_in_chunks(wire: &[u8], chunk_len: usize) -> (Feed, Vec<u8>) {
    let mut decoder = FrameDecoder::<CAPACITY>::new();
    for chunk in wire.chunks(chunk_len) {
        let (_, result) = decoder.feed(chunk);
        if result != Feed::Incomplete {
            return (result, decoder.payload().to_vec());
        }
    }
    (Feed::Incomplete, Vec::new())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_roundtrip(payload in arb_payload()) {
        let wire = encode_vec(&payload);
        let (result, decoded) = decode_in_chunks(&wire, wire.len());
        prop_assert_eq!(result, Feed::Complete(payload.len()));
        prop_assert_eq!(decoded, payload);
    }

    #[test]
    fn prop_markers_only_at_frame_edges(payload in arb_payload()) {
        let wire = encode_vec(&payload);
        let interior = &wire[1..wire.len() - 1];
        prop_assert_eq!(wire.first(), Some(&END));
        prop_assert_eq!(wire.last(), Some(&END));
        prop_assert!(!interior.contains(&END));
    }

    #[test]
    fn prop_chunk_boundaries_do_not_matter(
        payload in arb_payload(),
        chunk_len in 1usize..=16,
    ) {
        let wire = encode_vec(&payload);
        let whole = decode_in_chunks(&wire, wire.len());
        let split = decode_in_chunks(&wire, chunk_len);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn prop_decoder_restarts_after_garbage(
        garbage in prop::collection::vec(any::<u8>(), 0..32),
        payload in arb_payload(),
    ) {
        let mut decoder = FrameDecoder::<CAPACITY>::new();
        for byte in garbage {
            let _ = decoder.feed_byte(byte);
        }
        decoder.reset();

        let wire = encode_vec(&payload);
        let (_, result) = decoder.feed(&wire);
        prop_assert_eq!(result, Feed::Complete(payload.len()));
        prop_assert_eq!(decoder.payload(), payload.as_slice());
    }

    #[test]
    fn prop_decoder_handles_arbitrary_bytes(
        wire in prop::collection::vec(any::<u8>(), 0..256),
        min_len in 0usize..8,
        max_len in 0usize..=2 * CAPACITY,
    ) {
        let mut decoder = FrameDecoder::<CAPACITY>::with_limits(min_len, max_len);
        let mut rest = wire.as_slice();
        while !rest.is_empty() {
            let (consumed, result) = decoder.feed(rest);
            prop_assert!(consumed >= 1 && consumed <= rest.len());
            if let Feed::Complete(len) = result {
                prop_assert!(len >= min_len && len <= max_len.min(CAPACITY));
                prop_assert_eq!(decoder.payload().len(), len);
            }
            rest = &rest[consumed..];
        }
    }

    #[test]
    fn prop_encoded_frame_matches_free_function(payload in arb_payload()) {
        let frame = EncodedFrame::<{ 2 * CAPACITY + 2 }>::from_payload(&payload)
            .expect("capacity covers the worst case");
        let wire = encode_vec(&payload);
        prop_assert_eq!(frame.as_bytes(), wire.as_slice());
    }
}
