//! Fuzz target for ServerFrame::decode
//!
//! Feeds arbitrary bytes to the inbound frame decoder. Decoding must never
//! panic; invalid input returns an error. Frames that decode must re-encode,
//! and the re-encoded text must decode to the same frame.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomsync_proto::ServerFrame;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(frame) = ServerFrame::decode(text) else {
        return;
    };
    if matches!(frame, ServerFrame::Unknown) {
        return;
    }

    let encoded = frame.encode().expect("decoded frame must encode");
    let again = ServerFrame::decode(&encoded).expect("re-encoded frame must decode");
    assert_eq!(frame, again);
});
