//! Fuzz target for smart HTTP ref advertisement parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(advertisement) = knit_git::RefAdvertisement::parse(data) else {
        return;
    };

    let _ = advertisement.head();
    let _ = advertisement.head_symref();
    if !advertisement.refs.is_empty() {
        let request = knit_git::build_want_request(&advertisement.refs);
        assert!(request.ends_with(b"00000009done\n"));
    }
});
