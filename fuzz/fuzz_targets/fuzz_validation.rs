//! Fuzz target for inbound request validation.
//!
//! Checks that forward-path validation never panics and that every path it
//! accepts is free of relative or empty segments, and that auth-path
//! selection is total over its inputs.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use std::time::Duration;

use booking_gateway::forwarder::{AuthPath, ForwardOptions, select_auth_path};
use booking_gateway::validation::validate_forward_path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && validate_forward_path(s).is_ok()
    {
        assert!(s.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != ".."));
        assert!(!s.contains(['\\', '?', '#']));
    }

    if let Some(&flags) = data.first() {
        let token_present = flags & 0b001 != 0;
        let opts = ForwardOptions {
            timeout: Duration::from_secs(5),
            require_auth: flags & 0b010 != 0,
            prefer_user_auth: flags & 0b100 != 0,
        };
        let path = select_auth_path(token_present, &opts);
        if !token_present {
            assert_ne!(path, AuthPath::User);
        }
    }
});
