//! Fuzz target for capabilities.{toml,json} parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sc_config::capabilities::ConfigFormat;
use sc_config::{validate_config, CapabilityConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    for format in [ConfigFormat::Toml, ConfigFormat::Json] {
        if let Ok(config) = CapabilityConfig::parse(s, format) {
            let _ = validate_config(&config);
        }
    }
});
