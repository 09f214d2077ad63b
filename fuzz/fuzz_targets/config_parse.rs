//! Fuzz test for configuration file parsing
//!
//! Tests that arbitrary TOML input doesn't cause panics or crashes when
//! parsed and validated as HALYARD configuration.

#![no_main]

use halyard_transport::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<toml::Value, _> = toml::from_str(s);

        // Parse plus validation, including bind address parsing
        if let Ok(config) = Config::from_toml_str(s) {
            let _ = config.transport.parse_bind_addr();
        }
    }
});
