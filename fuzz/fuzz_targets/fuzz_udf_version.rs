//! Fuzz target for the UDF plugin version and function list parsers.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sc_core::probe::udf::{parse_function_list, parse_udf_version};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_udf_version(s);
        for function in parse_function_list(s) {
            assert!(!function.is_empty());
            assert_eq!(function.trim(), function);
        }
    }
});
