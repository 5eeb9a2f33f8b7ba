//! Arbitrary bytes into the client event decoder.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tephra_proto::{decode_event, encode_event};

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = decode_event(data) {
        let encoded = encode_event(&event);
        assert_eq!(decode_event(&encoded).ok(), Some(event));
    }
});
