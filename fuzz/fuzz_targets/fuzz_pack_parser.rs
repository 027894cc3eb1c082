//! Fuzz target for git pack file parsing.
//!
//! Parses arbitrary bytes as a pack and stores whatever parses, so both the
//! record decoder and the delta resolution pass see hostile input.

#![no_main]

use knit_storage::MemoryObjectStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(records) = knit_git::parse_pack(data) else {
        return;
    };

    for record in &records {
        assert_eq!(record.declared_size, record.content.len() as u64);
    }

    // Fresh store per iteration
    let store = MemoryObjectStore::new();
    let _ = knit_git::write_all(&store, &records);
});
