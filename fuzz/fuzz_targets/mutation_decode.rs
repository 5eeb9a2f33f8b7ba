//! Arbitrary bytes into the mutation frame decoder.
//!
//! Decoding must never panic. Anything that decodes must survive a second
//! encode/decode pass byte for byte (floats may be NaN, so bytes are compared
//! rather than values).

#![no_main]

use libfuzzer_sys::fuzz_target;
use tephra_proto::{decode_mutations, encode_mutations};

fuzz_target!(|data: &[u8]| {
    let Ok(batch) = decode_mutations(data) else { return };

    let encoded = encode_mutations(&batch);
    let Ok(again) = decode_mutations(&encoded) else {
        panic!("re-encoded batch of {} mutations failed to decode", batch.len());
    };
    assert_eq!(again.len(), batch.len());
    assert_eq!(encode_mutations(&again), encoded);
});
