//! Fuzz target: `RigConfig::from_json`
//!
//! Feeds arbitrary bytes to the config parser and asserts that it never
//! panics and that anything it accepts also passes validation.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use telerig::config::RigConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = RigConfig::from_json(data) {
        assert!(config.validate().is_ok(), "accepted config must validate");
        assert!(config.sensor_node.alarm_sustain_ms >= config.sensor_node.loop_interval_ms);
    }

    // The override path swallows every failure.
    if let Ok(text) = core::str::from_utf8(data) {
        let _ = RigConfig::with_override(Some(text));
    }
});
