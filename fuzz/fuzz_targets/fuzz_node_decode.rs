#![no_main]

use libfuzzer_sys::fuzz_target;
use wordex::index::{BtreeIndex, IndexInfo, MatchOptions, MemoryStorage};

fuzz_target!(|data: (u32, &[u8])| {
    // Arbitrary bytes as an index file: reads may fail but never panic
    let (root, bytes) = data;
    let info = IndexInfo::new(64, root % (bytes.len() as u32 + 1));
    let Ok(index) = BtreeIndex::open(&info, MemoryStorage::new(bytes.to_vec())) else {
        return;
    };

    let _ = index.find_articles("a", MatchOptions::default(), 0);
    let _ = index.find_chain_offset_exact_or_prefix("");
    let _ = index.get_all_headwords(None);
});
