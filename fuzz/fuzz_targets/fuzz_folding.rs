#![no_main]

use libfuzzer_sys::fuzz_target;
use wordex::utils::folding;

fuzz_target!(|data: &str| {
    // Folding must be idempotent on arbitrary text
    let folded = folding::apply(data);
    assert_eq!(folding::apply(&folded), folded);
    let _ = folding::trim_whitespace_or_punct(data);
    let _ = folding::unescape_wildcard_symbols(&folding::escape_wildcard_symbols(data));
});
