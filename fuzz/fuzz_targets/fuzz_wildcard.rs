#![no_main]

use libfuzzer_sys::fuzz_target;
use wordex::query::WildcardQuery;

fuzz_target!(|data: (&str, &str)| {
    let (pattern, candidate) = data;
    if let Ok(query) = WildcardQuery::new(pattern) {
        let _ = query.matches(candidate);
    }
});
