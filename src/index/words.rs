//! In-memory headword collection fed to the index builder.

use crate::index::types::{MAX_MIDDLE_MATCH_CHAIN, WordArticleLink};
use crate::utils::folding;
use std::collections::BTreeMap;
use std::collections::btree_map;
use tracing::warn;

/// Folded key -> every headword occurrence folding to it, ordered by key.
///
/// Keys are the fold of the word part only; the prefix of a middle-word
/// entry is stored with the link but never folded into the key.
#[derive(Debug, Clone, Default)]
pub struct IndexedWords {
    chains: BTreeMap<String, Vec<WordArticleLink>>,
}

impl IndexedWords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a headword under its full form and under each of its later
    /// words, so "ice cream" can also be found by "cream".
    ///
    /// Headwords longer than `max_headword_size` characters, or with an
    /// embedded NUL, are skipped with a warning.
    pub fn add_word(&mut self, headword: &str, article_offset: u32, max_headword_size: usize) {
        let Some(headword) = storable(headword) else {
            return;
        };

        let size = headword.chars().count();
        if size > max_headword_size {
            let start: String = headword.chars().take(30).collect();
            warn!(headword = %start, size, "Skipped too long headword");
            return;
        }

        let word = headword.trim_matches(folding::is_whitespace);
        let mut words_added = 0usize;
        let mut chars = word.char_indices();

        'words: loop {
            // Find the start of the next word
            let start = loop {
                match chars.next() {
                    Some((i, c)) if !is_separator(c) => break i,
                    Some(_) => continue,
                    None => break 'words,
                }
            };

            let tail = &word[start..];
            let chain = self.chains.entry(folding::apply(tail)).or_default();

            // The whole headword always goes in; middle matches are capped
            if start == 0 || chain.len() < MAX_MIDDLE_MATCH_CHAIN {
                chain.push(WordArticleLink::with_prefix(tail, article_offset, &word[..start]));
            }
            words_added += 1;

            // Skip the rest of this word
            loop {
                match chars.next() {
                    Some((_, c)) if is_separator(c) => break,
                    Some(_) => continue,
                    None => break 'words,
                }
            }
        }

        if words_added == 0 {
            // Nothing but whitespace and punctuation
            let key = folding::apply_whitespace_only(word);
            if !key.is_empty() {
                self.insert(key, WordArticleLink::new(word, article_offset));
            }
        }
    }

    /// Index a headword as a single unit, without middle-word entries
    pub fn add_single_word(&mut self, headword: &str, article_offset: u32) {
        let Some(headword) = storable(headword) else {
            return;
        };
        self.insert(
            folding::fold_key(headword),
            WordArticleLink::new(headword, article_offset),
        );
    }

    /// Append a link to the chain of an already folded key
    pub fn insert(&mut self, key: impl Into<String>, link: WordArticleLink) {
        self.chains.entry(key.into()).or_default().push(link);
    }

    pub fn get(&self, key: &str) -> Option<&[WordArticleLink]> {
        self.chains.get(key).map(Vec::as_slice)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Chains in ascending key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<WordArticleLink>> {
        self.chains.iter()
    }
}

impl<'a> IntoIterator for &'a IndexedWords {
    type Item = (&'a String, &'a Vec<WordArticleLink>);
    type IntoIter = btree_map::Iter<'a, String, Vec<WordArticleLink>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<BTreeMap<String, Vec<WordArticleLink>>> for IndexedWords {
    fn from(chains: BTreeMap<String, Vec<WordArticleLink>>) -> Self {
        Self { chains }
    }
}

/// Headword with trailing NULs removed, or `None` when a NUL remains inside,
/// since stored strings end at the first NUL.
fn storable(headword: &str) -> Option<&str> {
    let headword = headword.trim_end_matches('\0');
    if headword.contains('\0') {
        warn!(headword = %headword.replace('\0', "\\0"), "Skipped headword with an embedded NUL");
        return None;
    }
    Some(headword)
}

#[inline]
fn is_separator(c: char) -> bool {
    folding::is_whitespace(c) || folding::is_punct(c)
}
