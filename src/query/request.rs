//! Background word searches over a [`BtreeIndex`].
//!
//! A [`WordSearchRequest`] is the caller's handle; the matching work is a
//! [`SearchJob`] that runs on a shared worker pool. The handle can read the
//! matches found so far at any time, cancel the search, and wait for it to
//! finish. Dropping a started request cancels it and blocks until its job
//! has exited. A job still queued on the pool is run inline by `wait` and
//! `drop`, so neither blocks a pool thread on work queued behind it.

use crate::index::error::{IndexError, Result};
use crate::index::reader::{BtreeIndex, ChainLookup};
use crate::index::types::{WordArticleLink, WordMatch};
use crate::query::wildcard::{self, WildcardQuery};
use crate::utils::cancel::CancelToken;
use crate::utils::folding;
use ahash::AHashSet;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// What a word search looks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub word: String,
    /// A stemmed search never chops the folded word below this length
    pub min_length: usize,
    /// Trailing characters a stemmed search may chop off, and how much longer
    /// than the query a match may be. `None` means unbounded, with no chopping.
    pub max_suffix_variation: Option<usize>,
    /// Also match headwords by their later words, and honour wildcards
    pub allow_middle_matches: bool,
    /// Scanning stops once this many matches are collected. The chain being
    /// processed is finished first, so a request can return a few more.
    pub max_results: usize,
}

impl SearchParams {
    /// Every headword starting with `word`, middle matches and wildcards
    /// included
    pub fn prefix(word: impl Into<String>, max_results: usize) -> Self {
        Self {
            word: word.into(),
            min_length: 0,
            max_suffix_variation: None,
            allow_middle_matches: true,
            max_results,
        }
    }

    /// Headwords sharing a stem with `word`: the folded word is retried with
    /// up to `max_suffix_variation` trailing characters removed
    pub fn stemmed(
        word: impl Into<String>,
        min_length: usize,
        max_suffix_variation: usize,
        max_results: usize,
    ) -> Self {
        Self {
            word: word.into(),
            min_length,
            max_suffix_variation: Some(max_suffix_variation),
            allow_middle_matches: false,
            max_results,
        }
    }
}

/// The index a search runs against
#[derive(Clone)]
pub struct SearchTarget {
    /// Used in log messages
    pub name: String,
    pub index: Arc<BtreeIndex>,
    /// Set when the dictionary failed to initialise; the request then reports
    /// it as its error instead of searching
    pub init_error: Option<String>,
}

impl SearchTarget {
    pub fn new(name: impl Into<String>, index: Arc<BtreeIndex>) -> Self {
        Self {
            name: name.into(),
            index,
            init_error: None,
        }
    }
}

#[derive(Default)]
struct Matches {
    list: Vec<WordMatch>,
    seen: AHashSet<String>,
}

impl Matches {
    /// Record a match unless the same word was already found
    fn add(&mut self, word: String, link: WordArticleLink) {
        if self.seen.insert(word.clone()) {
            self.list.push(WordMatch { word, link });
        }
    }
}

struct RequestState {
    matches: Mutex<Matches>,
    error: Mutex<Option<String>>,
    finished: AtomicBool,
    cancel: CancelToken,
    done: Mutex<Option<Sender<()>>>,
}

impl RequestState {
    /// Mark the request finished. Only the first call has any effect.
    fn finish(&self) {
        if let Some(done) = lock(&self.done).take() {
            self.finished.store(true, Ordering::Release);
            let _ = done.send(());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running (or pending) word search
pub struct WordSearchRequest {
    state: Arc<RequestState>,
    done: Mutex<Receiver<()>>,
    /// The job of a started request until a pool thread picks it up
    queued: Arc<Mutex<Option<SearchJob>>>,
    join_on_drop: bool,
}

impl WordSearchRequest {
    /// Start searching `target` on `pool`
    pub fn start(pool: &ThreadPool, target: SearchTarget, params: SearchParams) -> Self {
        let (mut request, job) = Self::pending(target, params);
        request.join_on_drop = true;
        *lock(&request.queued) = Some(job);

        let queued = Arc::clone(&request.queued);
        pool.spawn(move || {
            let job = lock(&queued).take();
            if let Some(job) = job {
                job.run();
            }
        });
        request
    }

    /// Create a request together with the job that fulfils it, without
    /// running anything. The job finishes the request when it runs, or when
    /// it is dropped unrun.
    pub fn pending(target: SearchTarget, params: SearchParams) -> (Self, SearchJob) {
        let (tx, rx) = mpsc::channel();
        let state = Arc::new(RequestState {
            matches: Mutex::new(Matches::default()),
            error: Mutex::new(None),
            finished: AtomicBool::new(false),
            cancel: CancelToken::new(),
            done: Mutex::new(Some(tx)),
        });

        let request = Self {
            state: Arc::clone(&state),
            done: Mutex::new(rx),
            queued: Arc::new(Mutex::new(None)),
            join_on_drop: false,
        };
        let job = SearchJob {
            state,
            target,
            params,
        };
        (request, job)
    }

    /// Ask the search to stop at its next checkpoint
    pub fn cancel(&self) {
        self.state.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancel.is_cancelled()
    }

    /// Results are final once this returns `true`
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Block until the search has finished. A job not yet picked up by the
    /// pool runs on the calling thread.
    pub fn wait(&self) {
        let job = lock(&self.queued).take();
        if let Some(job) = job {
            job.run();
        }

        let done = lock(&self.done);
        if !self.is_finished() {
            // A closed channel also means the job is gone
            let _ = done.recv();
        }
    }

    /// Wait at most `timeout`; returns whether the search has finished
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let done = lock(&self.done);
        if self.is_finished() {
            return true;
        }
        !matches!(done.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }

    /// Matches found so far, in the order they were found
    pub fn results(&self) -> Vec<WordMatch> {
        lock(&self.state.matches).list.clone()
    }

    pub fn matches_count(&self) -> usize {
        lock(&self.state.matches).list.len()
    }

    /// Why the search could not run, if it could not
    pub fn error_string(&self) -> Option<String> {
        lock(&self.state.error).clone()
    }
}

impl Drop for WordSearchRequest {
    fn drop(&mut self) {
        self.cancel();
        if self.join_on_drop {
            self.wait();
        }
    }
}

/// The work behind a [`WordSearchRequest`]
pub struct SearchJob {
    state: Arc<RequestState>,
    target: SearchTarget,
    params: SearchParams,
}

impl SearchJob {
    /// Run the search to completion (or cancellation) and finish the request
    pub fn run(self) {
        if self.state.cancel.is_cancelled() {
            return;
        }

        if let Some(error) = &self.target.init_error {
            *lock(&self.state.error) = Some(error.clone());
            return;
        }

        if let Err(e) = self.find_matches() {
            warn!(dictionary = %self.target.name, error = %e, "Index searching failed");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.cancel.is_cancelled()
    }

    fn find_matches(&self) -> Result<()> {
        let params = &self.params;
        let query = params.word.trim_end_matches('\0');

        let use_wildcards = params.allow_middle_matches && wildcard::has_wildcards(query);

        let (mut folded, pattern) = if use_wildcards {
            match WildcardQuery::new(query) {
                Ok(pattern) => (pattern.folded_prefix.clone(), Some(pattern)),
                Err(e) => {
                    warn!(query, error = %e, "Unusable wildcard pattern");
                    return Ok(());
                }
            }
        } else {
            (folding::fold_key(query), None)
        };

        let initial_len = folded.chars().count();

        let mut chars_left_to_chop = match params.max_suffix_variation {
            Some(max) => initial_len.saturating_sub(params.min_length).min(max),
            None => 0,
        };

        loop {
            self.scan(&folded, initial_len, pattern.as_ref())?;

            if chars_left_to_chop > 0 && !self.is_cancelled() {
                chars_left_to_chop -= 1;
                folded.pop();
                debug!(stem = %folded, "Retrying with a shorter stem");
            } else {
                return Ok(());
            }
        }
    }

    /// Collect matches from the chains starting at `folded`, moving forward
    /// while chain keys still begin with it
    fn scan(&self, folded: &str, initial_len: usize, pattern: Option<&WildcardQuery>) -> Result<()> {
        let params = &self.params;

        let Some(ChainLookup { mut cursor, .. }) = self.target.index.find_chain_offset_exact_or_prefix(folded)? else {
            return Ok(());
        };

        loop {
            if self.is_cancelled() {
                return Ok(());
            }

            let chain = cursor.read_chain()?;
            let head = chain
                .first()
                .ok_or_else(|| IndexError::corrupted("empty chain"))?;
            let head_folded = folding::fold_key(&head.word);

            let prefix_match = (pattern.is_some() && folded.is_empty()) || head_folded.starts_with(folded);
            if !prefix_match {
                return Ok(());
            }

            let extra_len = head_folded.chars().count().saturating_sub(initial_len);

            {
                let mut matches = lock(&self.state.matches);

                for link in chain {
                    match pattern {
                        Some(pattern) => {
                            let word = link.full_word();
                            if pattern.matches(&folding::apply_diacritics_only(&word)) {
                                matches.add(word, link);
                            }
                        }
                        None => {
                            let whole_word = params.allow_middle_matches || folding::apply(&link.prefix).is_empty();
                            let close_enough = params.max_suffix_variation.is_none_or(|max| extra_len <= max);
                            if whole_word && close_enough {
                                matches.add(link.full_word(), link);
                            }
                        }
                    }
                }

                if matches.list.len() >= params.max_results {
                    return Ok(());
                }
            }

            if self.is_cancelled() {
                return Ok(());
            }

            if cursor.leaf_exhausted() && !cursor.advance_leaf()? {
                return Ok(());
            }
        }
    }
}

impl Drop for SearchJob {
    fn drop(&mut self) {
        self.state.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::storage::MemoryStorage;
    use crate::index::words::IndexedWords;
    use crate::index::writer::build_index;
    use std::io::Cursor;

    fn target(words: &[(&str, u32)]) -> SearchTarget {
        let mut indexed = IndexedWords::new();
        for &(word, offset) in words {
            indexed.add_word(word, offset, 256);
        }
        let mut out = Cursor::new(Vec::new());
        let info = build_index(&indexed, &mut out).unwrap();
        let index = BtreeIndex::open(&info, MemoryStorage::new(out.into_inner())).unwrap();
        SearchTarget::new("test", Arc::new(index))
    }

    fn words_of(request: &WordSearchRequest) -> Vec<String> {
        request.results().into_iter().map(|m| m.word).collect()
    }

    #[test]
    fn test_cancel_before_run_finishes_once() {
        let (request, job) = WordSearchRequest::pending(target(&[("cat", 1)]), SearchParams::prefix("c", 10));
        request.cancel();
        job.run();

        assert!(request.is_finished());
        assert!(request.results().is_empty());

        let done = lock(&request.done);
        assert!(done.recv().is_ok());
        // The only sender went away after the single notification
        assert!(done.recv().is_err());
    }

    #[test]
    fn test_dropped_job_finishes_request() {
        let (request, job) = WordSearchRequest::pending(target(&[("cat", 1)]), SearchParams::prefix("c", 10));
        drop(job);
        request.wait();
        assert!(request.is_finished());
        assert!(request.results().is_empty());
    }

    #[test]
    fn test_init_error_is_reported() {
        let mut target = target(&[("cat", 1)]);
        target.init_error = Some("bad dictionary".into());

        let (request, job) = WordSearchRequest::pending(target, SearchParams::prefix("c", 10));
        job.run();
        assert!(request.is_finished());
        assert_eq!(request.error_string().as_deref(), Some("bad dictionary"));
        assert!(request.results().is_empty());
    }

    #[test]
    fn test_prefix_includes_middle_matches() {
        let target = target(&[("ice cream", 1), ("cream", 2), ("crest", 3)]);
        let (request, job) = WordSearchRequest::pending(target, SearchParams::prefix("cre", 10));
        job.run();
        assert_eq!(words_of(&request), ["ice cream", "cream", "crest"]);
    }

    #[test]
    fn test_stemmed_skips_middle_matches() {
        let target = target(&[("ice cream", 1), ("cream", 2), ("creamy", 3), ("creamiest", 4)]);
        let (request, job) = WordSearchRequest::pending(target, SearchParams::stemmed("cream", 3, 1, 10));
        job.run();
        // "creamiest" is more than one character longer than the query
        assert_eq!(words_of(&request), ["cream", "creamy"]);
    }

    #[test]
    fn test_soft_result_cap() {
        let target = target(&[("aa", 1), ("ab", 2), ("ac", 3), ("ad", 4)]);
        let (request, job) = WordSearchRequest::pending(target, SearchParams::prefix("a", 2));
        job.run();
        assert_eq!(words_of(&request), ["aa", "ab"]);
    }

    #[test]
    fn test_wildcard_without_prefix() {
        let target = target(&[("bat", 1), ("cat", 2), ("coat", 3)]);
        let (request, job) = WordSearchRequest::pending(target, SearchParams::prefix("?at", 10));
        job.run();
        assert_eq!(words_of(&request), ["bat", "cat"]);
    }

    #[test]
    fn test_drop_inside_own_pool_returns() {
        let pool = Arc::new(crate::query::search_pool(1).unwrap());
        let (tx, rx) = mpsc::channel();
        let search_target = target(&[("car", 1), ("cat", 2)]);

        let inner = Arc::clone(&pool);
        pool.spawn(move || {
            let request = WordSearchRequest::start(&inner, search_target.clone(), SearchParams::prefix("c", 10));
            drop(request);

            let request = WordSearchRequest::start(&inner, search_target, SearchParams::prefix("ca", 10));
            request.wait();
            let _ = tx.send(words_of(&request));
        });

        let words = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(words, ["car", "cat"]);
    }

    #[test]
    fn test_started_on_pool() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let request = WordSearchRequest::start(
            &pool,
            target(&[("car", 1), ("care", 2), ("cat", 3)]),
            SearchParams::prefix("car", 10),
        );
        request.wait();
        assert!(request.is_finished());
        assert!(request.wait_timeout(Duration::from_millis(1)));
        assert_eq!(words_of(&request), ["car", "care"]);
    }
}
