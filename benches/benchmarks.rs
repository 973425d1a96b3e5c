//! Performance benchmarks for wordex
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use wordex::Dictionary;
use wordex::index::{BtreeIndex, IndexInfo, IndexedWords, MatchOptions, MemoryStorage, build_index, build_index_file};
use wordex::query::search_pool;
use wordex::utils::folding;

/// Headwords shaped like a real word list: single words plus some phrases
fn sample_words(count: usize) -> IndexedWords {
    const SYLLABLES: [&str; 12] = ["ka", "ro", "mi", "tel", "an", "su", "ve", "dor", "li", "pa", "ne", "quo"];

    let mut words = IndexedWords::new();
    for i in 0..count {
        let mut word = String::new();
        let mut n = i;
        loop {
            word.push_str(SYLLABLES[n % SYLLABLES.len()]);
            n /= SYLLABLES.len();
            if n == 0 {
                break;
            }
        }
        if i % 10 == 0 {
            word.push_str(" de la Crème");
        }
        words.add_word(&word, i as u32, 256);
    }
    words
}

fn build_in_memory(words: &IndexedWords) -> BtreeIndex {
    let mut out = Cursor::new(Vec::new());
    let info = build_index(words, &mut out).expect("Failed to build index");
    BtreeIndex::open(&info, MemoryStorage::new(out.into_inner())).expect("Failed to open index")
}

fn bench_folding(c: &mut Criterion) {
    let inputs = ["cat", "Crème Brûlée", "  (ice-cream!)  ", "Ἀρχιμήδης"];

    let mut group = c.benchmark_group("folding");
    for input in inputs {
        group.bench_with_input(BenchmarkId::from_parameter(input), &input, |b, &w| {
            b.iter(|| folding::apply(black_box(w)))
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for count in [1_000usize, 50_000] {
        let words = sample_words(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &words, |b, words| {
            b.iter(|| {
                let mut out = Cursor::new(Vec::new());
                build_index(black_box(words), &mut out)
            })
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let index = build_in_memory(&sample_words(50_000));

    let mut group = c.benchmark_group("lookup");

    group.bench_function("exact_hit", |b| {
        b.iter(|| index.find_articles(black_box("telmiro"), MatchOptions::default(), 0))
    });

    group.bench_function("exact_miss", |b| {
        b.iter(|| index.find_articles(black_box("zzz"), MatchOptions::default(), 0))
    });

    group.bench_function("position_prefix", |b| {
        b.iter(|| index.find_chain_offset_exact_or_prefix(black_box("tel")).map(|l| l.is_some()))
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let pool = Arc::new(search_pool(2).expect("Failed to start pool"));
    let dict = Dictionary::new("bench", build_in_memory(&sample_words(50_000)), pool);

    let mut group = c.benchmark_group("search");

    group.bench_function("prefix", |b| {
        b.iter(|| {
            let request = dict.prefix_match(black_box("ka"), 100);
            request.wait();
            request.matches_count()
        })
    });

    group.bench_function("stemmed", |b| {
        b.iter(|| {
            let request = dict.stemmed_match(black_box("telmiros"), 3, 3, 100);
            request.wait();
            request.matches_count()
        })
    });

    group.bench_function("wildcard", |b| {
        b.iter(|| {
            let request = dict.prefix_match(black_box("ka?o*"), 100);
            request.wait();
            request.matches_count()
        })
    });

    group.finish();
}

fn bench_index_open(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("bench.idx");
    let info: IndexInfo = build_index_file(&sample_words(10_000), &path).expect("Failed to build index");

    c.bench_function("index_open_mmap", |b| {
        b.iter(|| {
            let index = BtreeIndex::open_mmap(black_box(&info), &path).expect("Failed to open index");
            index.root().is_ok()
        })
    });
}

criterion_group!(
    benches,
    bench_folding,
    bench_build,
    bench_lookup,
    bench_search,
    bench_index_open,
);

criterion_main!(benches);
