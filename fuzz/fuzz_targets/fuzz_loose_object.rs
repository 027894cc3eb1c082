//! Fuzz target for loose object decoding.
//!
//! Feeds arbitrary bytes both as an already inflated object and as a zlib
//! stream.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((object_type, content)) = knit_storage::parse_object(data) {
        assert!(data.ends_with(content));
        let _ = knit_storage::ObjectId::hash_object(object_type, content);
    }

    if let Ok(inflated) = knit_storage::decompress(data) {
        let _ = knit_storage::parse_object(&inflated);
    }
});
