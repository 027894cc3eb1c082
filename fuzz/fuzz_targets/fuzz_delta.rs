//! Fuzz target for the delta interpreter.
//!
//! Any instruction stream against any base must either produce exactly the
//! declared result size or fail with an error.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    base: Vec<u8>,
    delta: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Ok(result) = knit_git::apply_delta(&input.base, &input.delta) else {
        return;
    };

    let (_, after_base) = knit_git::decode_varint(&input.delta, 0).unwrap();
    let (result_size, _) = knit_git::decode_varint(&input.delta, after_base).unwrap();
    assert_eq!(result.len(), result_size);
});
