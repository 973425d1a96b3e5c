//! Word searches: prefix, stemmed and wildcard matching run as cancellable
//! background requests.

pub mod request;
pub mod wildcard;

pub use request::{SearchJob, SearchParams, SearchTarget, WordSearchRequest};
pub use wildcard::WildcardQuery;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Worker pool shared by search requests. `threads == 0` lets rayon pick
/// one thread per CPU.
pub fn search_pool(threads: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("wordex-search-{}", i))
        .build()
}
