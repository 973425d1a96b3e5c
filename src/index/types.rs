use crate::index::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Lower bound for the number of keys per node
pub const BTREE_MIN_ELEMENTS: usize = 64;

/// Upper bound for the number of keys per node
pub const BTREE_MAX_ELEMENTS: usize = 8192;

/// Value of the leading u32 that marks an internal node
pub const INTERNAL_NODE_MARKER: u32 = 0xFFFF_FFFF;

/// Middle-word entries stop being added to a chain past this size
pub const MAX_MIDDLE_MATCH_CHAIN: usize = 1024;

/// Headwords longer than this (in characters) are not indexed by default
pub const DEFAULT_MAX_HEADWORD_SIZE: usize = 256;

/// One occurrence of a headword, pointing at an article in the article store.
///
/// Multi-word headwords are also indexed by each of their later words; such
/// entries carry the skipped leading text in `prefix` so the full headword can
/// be reconstructed as `prefix + word`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordArticleLink {
    pub word: String,
    pub article_offset: u32,
    pub prefix: String,
}

impl WordArticleLink {
    pub fn new(word: impl Into<String>, article_offset: u32) -> Self {
        Self {
            word: word.into(),
            article_offset,
            prefix: String::new(),
        }
    }

    pub fn with_prefix(word: impl Into<String>, article_offset: u32, prefix: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            article_offset,
            prefix: prefix.into(),
        }
    }

    /// The headword as it appears in the dictionary
    pub fn full_word(&self) -> String {
        let mut full = String::with_capacity(self.prefix.len() + self.word.len());
        full.push_str(&self.prefix);
        full.push_str(&self.word);
        full
    }

    /// Size of this entry inside a serialized chain
    pub fn encoded_len(&self) -> usize {
        self.word.len() + 1 + self.prefix.len() + 1 + 4
    }
}

/// Handle returned by the builder and required to open the index again.
///
/// The owner of the index file persists it next to its own metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub btree_max_elements: u32,
    pub root_offset: u32,
}

impl IndexInfo {
    pub fn new(btree_max_elements: u32, root_offset: u32) -> Self {
        Self {
            btree_max_elements,
            root_offset,
        }
    }

    /// Read index info from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        let info: IndexInfo =
            serde_json::from_reader(file).map_err(|e| IndexError::InvalidInfo(e.to_string()))?;
        info.validate()?;
        Ok(info)
    }

    /// Write index info as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut file, self)
            .map_err(|e| IndexError::InvalidInfo(e.to_string()))?;
        file.flush()?;
        Ok(())
    }

    /// Conventional location of the info file for an index at `index_path`
    pub fn path_for(index_path: &Path) -> PathBuf {
        let mut path = index_path.as_os_str().to_owned();
        path.push(".info.json");
        PathBuf::from(path)
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.btree_max_elements as usize;
        if !(BTREE_MIN_ELEMENTS..=BTREE_MAX_ELEMENTS).contains(&size) {
            return Err(IndexError::InvalidInfo(format!(
                "btree node size {} outside [{}, {}]",
                size, BTREE_MIN_ELEMENTS, BTREE_MAX_ELEMENTS
            )));
        }
        Ok(())
    }
}

/// Normalization preferences applied when filtering exact lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Treat "cafe" and "café" as the same headword
    pub ignore_diacritics: bool,
    /// Ignore leading and trailing punctuation when comparing headwords
    pub ignore_punctuation: bool,
}

/// A match produced by a word search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordMatch {
    /// Full headword (prefix included)
    pub word: String,
    /// The index entry the match came from
    pub link: WordArticleLink,
}
