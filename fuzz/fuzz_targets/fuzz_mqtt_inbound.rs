//! Fuzz target: `inbound_message`
//!
//! Arbitrary topic/payload pairs from the broker must never panic the
//! conversion, and accepted messages must fit their fixed buffers.
//!
//! cargo fuzz run fuzz_mqtt_inbound

#![no_main]

use libfuzzer_sys::fuzz_target;
use telerig::adapters::mqtt::inbound_message;

fuzz_target!(|data: &[u8]| {
    // First byte picks the split between topic and payload.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (topic, payload) = rest.split_at(split);
    let Ok(topic) = core::str::from_utf8(topic) else {
        return;
    };

    if let Some(msg) = inbound_message(topic, payload) {
        assert_eq!(msg.topic.as_str(), topic);
        assert!(msg.payload.len() <= 128);
        assert_eq!(msg.payload.as_slice(), &payload[..msg.payload.len()]);
    }
});
