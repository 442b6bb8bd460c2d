//! Fuzz testing for the request body and stack parsers.
//!
//! These parsers see untrusted input (form bodies, query strings) or text
//! whose format is not guaranteed (backtraces), so they must never panic.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_parsers
//! cargo +nightly fuzz run fuzz_parsers -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use weblayer::middleware::FormParams;
use weblayer::stack::StackTrace;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(params) = FormParams::parse(s) {
            // Every decoded key must be retrievable.
            for (key, _) in params.iter() {
                assert!(params.get(key).is_some());
            }
            let _ = serde_json::to_string(&params);
        }

        let stack = StackTrace::parse(s);
        let _ = stack.summary(3);
    }
});
