// Fuzz target exploring rule config parsing under arbitrary input.
#![no_main]

use arbiter_rules::{ActionSelector, PropertyBag, RuleConfigLoader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(definitions) = RuleConfigLoader::parse(text) {
        let selector = ActionSelector::<PropertyBag>::new("wait").with_definitions(definitions);
        let _ = selector.select(&PropertyBag::new().with("wealth", 100.0).with("phase", "mid"));
    }
});
