//! A named dictionary backed by a B-tree index.
//!
//! This is what callers hold on to: it owns the opened index, the match
//! preferences and a handle to the shared search pool, and hands out search
//! requests.

use crate::index::reader::BtreeIndex;
use crate::index::types::{IndexInfo, MatchOptions, WordArticleLink};
use crate::query::request::{SearchParams, SearchTarget, WordSearchRequest};
use rayon::ThreadPool;
use std::fmt::Display;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

pub struct Dictionary {
    name: String,
    index: Arc<BtreeIndex>,
    pool: Arc<ThreadPool>,
    options: MatchOptions,
    init_error: Option<String>,
}

impl Dictionary {
    pub fn new(name: impl Into<String>, index: BtreeIndex, pool: Arc<ThreadPool>) -> Self {
        Self {
            name: name.into(),
            index: Arc::new(index),
            pool,
            options: MatchOptions::default(),
            init_error: None,
        }
    }

    /// A dictionary that could not be initialised. Searches report `error`
    /// instead of running.
    pub fn failed(name: impl Into<String>, error: impl Display, pool: Arc<ThreadPool>) -> Self {
        Self {
            init_error: Some(error.to_string()),
            ..Self::new(name, BtreeIndex::new(), pool)
        }
    }

    /// Open the index at `index_path`, with its info file next to it. Failing
    /// to open is not fatal: the error is kept and reported by searches.
    pub fn open(name: impl Into<String>, index_path: &Path, pool: Arc<ThreadPool>) -> Self {
        let opened = IndexInfo::load(&IndexInfo::path_for(index_path))
            .and_then(|info| BtreeIndex::open_mmap(&info, index_path));

        Self::from_opened(name.into(), opened, pool)
    }

    /// Open the index at `index_path` through `file`, a handle shared with
    /// other readers of the same file. Reads take the lock for each node.
    pub fn open_shared(
        name: impl Into<String>,
        index_path: &Path,
        file: Arc<Mutex<File>>,
        pool: Arc<ThreadPool>,
    ) -> Self {
        let opened = IndexInfo::load(&IndexInfo::path_for(index_path))
            .and_then(|info| BtreeIndex::open_file(&info, file));
        Self::from_opened(name.into(), opened, pool)
    }

    fn from_opened(name: String, opened: crate::index::Result<BtreeIndex>, pool: Arc<ThreadPool>) -> Self {
        match opened {
            Ok(index) => Self::new(name, index, pool),
            Err(e) => {
                warn!(dictionary = %name, error = %e, "Failed to open index");
                Self::failed(name, e, pool)
            }
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &BtreeIndex {
        &self.index
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    fn target(&self) -> SearchTarget {
        SearchTarget {
            name: self.name.clone(),
            index: Arc::clone(&self.index),
            init_error: self.init_error.clone(),
        }
    }

    /// Articles whose headword is exactly `word` under the current match
    /// options. `max_count == 0` means no limit.
    pub fn find_articles(&self, word: &str, max_count: usize) -> Vec<WordArticleLink> {
        self.index.find_articles(word, self.options, max_count)
    }

    pub fn prefix_match(&self, word: &str, max_results: usize) -> WordSearchRequest {
        self.search(SearchParams::prefix(word, max_results))
    }

    pub fn stemmed_match(
        &self,
        word: &str,
        min_length: usize,
        max_suffix_variation: usize,
        max_results: usize,
    ) -> WordSearchRequest {
        self.search(SearchParams::stemmed(word, min_length, max_suffix_variation, max_results))
    }

    /// Start an arbitrary search on the shared pool
    pub fn search(&self, params: SearchParams) -> WordSearchRequest {
        WordSearchRequest::start(&self.pool, self.target(), params)
    }

    /// All headwords, sorted. Failures are logged and give what was read.
    pub fn get_headwords(&self) -> Vec<String> {
        match self.index.get_all_headwords(None) {
            Ok(set) => {
                let mut headwords: Vec<String> = set.into_iter().collect();
                headwords.sort_unstable();
                headwords
            }
            Err(e) => {
                warn!(dictionary = %self.name, error = %e, "Failed headwords retrieving");
                Vec::new()
            }
        }
    }
}
