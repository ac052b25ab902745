#![no_main]

use libfuzzer_sys::fuzz_target;

use gatewatch_core::config::GatewatchConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(config) = GatewatchConfig::parse(content) {
            let _ = config.validate();
        }
    }
});
