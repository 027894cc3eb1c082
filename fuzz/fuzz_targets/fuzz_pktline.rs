//! Fuzz target for git pkt-line parsing.
//!
//! Tests that the pkt-line reader handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut reader = knit_git::PktLineReader::new(Cursor::new(data));

    // Each packet consumes at least four bytes, so this terminates
    loop {
        match reader.read() {
            Ok(Some(packet)) => {
                let encoded = packet.encode();
                assert!(encoded.len() <= knit_git::MAX_PKT_LEN);
            }
            Ok(None) | Err(_) => break,
        }
    }
});
