#![no_main]

use libfuzzer_sys::fuzz_target;
use mutation_summary::parse_selectors;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(selectors) = parse_selectors(input) else {
        return;
    };
    let rendered: Vec<String> = selectors.iter().map(ToString::to_string).collect();
    let reparsed = parse_selectors(&rendered.join(","));
    // Shorthand rendering only holds for values that are valid names.
    if let Ok(reparsed) = reparsed {
        assert_eq!(reparsed.len(), selectors.len());
    }
});
