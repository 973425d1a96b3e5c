//! Read side of the index: node loading, key lookup and leaf scans.

use crate::index::error::{IndexError, Result};
use crate::index::node::{InternalNode, LeafNode, NODE_HEADER_SIZE, Node, check_child_offset, decompress};
use crate::index::storage::{FileStorage, IndexStorage, MmapStorage};
use crate::index::types::{IndexInfo, MatchOptions, WordArticleLink};
use crate::utils::cancel::{CancelToken, is_cancelled};
use crate::utils::folding;
use ahash::AHashSet;
use roaring::RoaringBitmap;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fs::File;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

/// A B-tree index opened on some storage.
///
/// The root node is read on first use and cached for the lifetime of the
/// index; every other node is read (and decompressed) per lookup, so
/// concurrent readers never share mutable buffers.
pub struct BtreeIndex {
    storage: Option<Box<dyn IndexStorage>>,
    node_size: usize,
    root_offset: u32,
    root: OnceLock<Node>,
}

impl Default for BtreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BtreeIndex {
    /// An index that is not opened yet. Every lookup fails with
    /// [`IndexError::IndexNotOpened`] until [`open_index`](Self::open_index).
    pub fn new() -> Self {
        Self {
            storage: None,
            node_size: 0,
            root_offset: 0,
            root: OnceLock::new(),
        }
    }

    /// Attach the index to `storage`, dropping any cached root node
    pub fn open_index(&mut self, info: &IndexInfo, storage: impl IndexStorage + 'static) -> Result<()> {
        info.validate()?;
        self.storage = Some(Box::new(storage));
        self.node_size = info.btree_max_elements as usize;
        self.root_offset = info.root_offset;
        self.root = OnceLock::new();
        Ok(())
    }

    pub fn open(info: &IndexInfo, storage: impl IndexStorage + 'static) -> Result<Self> {
        let mut index = Self::new();
        index.open_index(info, storage)?;
        Ok(index)
    }

    /// Open on a file handle shared with other users of the same file
    pub fn open_file(info: &IndexInfo, file: Arc<Mutex<File>>) -> Result<Self> {
        Self::open(info, FileStorage::new(file))
    }

    /// Open on a read-only memory map of `path`
    pub fn open_mmap(info: &IndexInfo, path: &Path) -> Result<Self> {
        Self::open(info, MmapStorage::open(path)?)
    }

    pub fn is_open(&self) -> bool {
        self.storage.is_some()
    }

    /// Node size (`M`) the index was built with
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    pub fn root_offset(&self) -> u32 {
        self.root_offset
    }

    fn storage(&self) -> Result<&dyn IndexStorage> {
        self.storage.as_deref().ok_or(IndexError::IndexNotOpened)
    }

    /// Read the `[uncompressed][compressed]` header of the node at `offset`
    pub fn read_node_header(&self, offset: u32) -> Result<(u32, u32)> {
        let mut header = [0u8; NODE_HEADER_SIZE as usize];
        self.storage()?.read_at(offset as u64, &mut header)?;
        Ok((
            u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
            u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
        ))
    }

    /// Read and decode the node at `offset`
    pub fn read_node(&self, offset: u32) -> Result<Node> {
        let storage = self.storage()?;
        let (uncompressed_size, compressed_size) = self.read_node_header(offset)?;

        let data_start = offset as u64 + NODE_HEADER_SIZE;
        let data_end = data_start + compressed_size as u64;
        if data_end > storage.len()? {
            return Err(IndexError::Decompression { offset });
        }

        let mut compressed = vec![0u8; compressed_size as usize];
        storage.read_at(data_start, &mut compressed)?;

        let body = decompress(&compressed, uncompressed_size as usize)
            .ok_or(IndexError::Decompression { offset })?;

        Node::decode(body, self.node_size, || {
            let mut link = [0u8; 4];
            storage.read_at(data_end, &mut link)?;
            Ok(u32::from_le_bytes(link))
        })
    }

    /// The root node, loaded once
    pub fn root(&self) -> Result<&Node> {
        if let Some(root) = self.root.get() {
            return Ok(root);
        }
        let node = self.read_node(self.root_offset)?;
        Ok(self.root.get_or_init(|| node))
    }

    /// Walk down to the leaf that may hold `target`. An empty target selects
    /// the leftmost leaf.
    fn descend(&self, target: &str) -> Result<Descent<'_>> {
        let mut current = Cow::Borrowed(self.root()?);
        let mut offset = self.root_offset;

        loop {
            let child = match current {
                Cow::Borrowed(Node::Leaf(leaf)) => return Ok(Descent::new(Cow::Borrowed(leaf), offset, self)),
                Cow::Owned(Node::Leaf(leaf)) => return Ok(Descent::new(Cow::Owned(leaf), offset, self)),
                Cow::Borrowed(Node::Internal(node)) => pick_child(node, target),
                Cow::Owned(Node::Internal(node)) => pick_child(&node, target),
            };
            check_child_offset(offset, child)?;
            current = Cow::Owned(self.read_node(child)?);
            offset = child;
        }
    }

    /// Find the chain whose key equals `folded_target`, or failing that the
    /// first chain sorting after it (a prefix candidate).
    ///
    /// An empty target yields the first chain of the index. `None` means the
    /// target sorts after every key, or the index is empty.
    pub fn find_chain_offset_exact_or_prefix(&self, folded_target: &str) -> Result<Option<ChainLookup<'_>>> {
        let Descent { leaf, offset, at_root } = self.descend(folded_target)?;

        if leaf.is_empty() {
            // Only an entirely empty tree has an empty leaf, as its root
            return if at_root {
                Ok(None)
            } else {
                Err(IndexError::corrupted("empty leaf below the root"))
            };
        }

        if folded_target.is_empty() {
            let pos = leaf.first_chain();
            return Ok(Some(ChainLookup::new(false, ChainCursor::new(self, leaf, offset, pos))));
        }

        let starts = leaf.chain_starts()?;
        let mut window = 0usize;
        let mut window_size = starts.len();

        loop {
            let check = window + window_size / 2;
            let folded = folding::fold_key(&leaf.chain_head(starts[check])?);

            match folded_target.cmp(folded.as_str()) {
                Ordering::Equal => {
                    return Ok(Some(ChainLookup::new(true, ChainCursor::new(self, leaf, offset, starts[check]))));
                }
                Ordering::Less => {
                    window_size /= 2;
                    if window_size == 0 {
                        // Target lands before the last chain checked
                        return Ok(Some(ChainLookup::new(false, ChainCursor::new(self, leaf, offset, starts[check]))));
                    }
                }
                Ordering::Greater => {
                    window_size -= window_size / 2 + 1;
                    if window_size == 0 {
                        if let Some(&next) = starts.get(check + 1) {
                            return Ok(Some(ChainLookup::new(false, ChainCursor::new(self, leaf, offset, next))));
                        }

                        // Past the last chain here: the answer is the first
                        // chain of the next leaf, if any
                        let end = leaf.end();
                        let mut cursor = ChainCursor::new(self, leaf, offset, end);
                        return if cursor.advance_leaf()? {
                            Ok(Some(ChainLookup::new(false, cursor)))
                        } else {
                            Ok(None)
                        };
                    }
                    window = check + 1;
                }
            }
        }
    }

    /// Exact lookup of a headword, filtered by [`antialias`](Self::antialias).
    ///
    /// At most `max_count` links are decoded (0 means no limit). Lookup
    /// failures are logged and yield an empty result.
    pub fn find_articles(&self, word: &str, options: MatchOptions, max_count: usize) -> Vec<WordArticleLink> {
        let word = word.trim_end_matches('\0');

        match self.try_find_articles(word, options, max_count) {
            Ok(links) => links,
            Err(e) => {
                warn!(word, error = %e, "Articles searching failed");
                Vec::new()
            }
        }
    }

    fn try_find_articles(&self, word: &str, options: MatchOptions, max_count: usize) -> Result<Vec<WordArticleLink>> {
        let folded = folding::fold_key(word);

        let Some(mut lookup) = self.find_chain_offset_exact_or_prefix(&folded)? else {
            return Ok(Vec::new());
        };
        if !lookup.exact_match {
            return Ok(Vec::new());
        }

        let mut links = lookup.cursor.read_chain_limited(max_count)?;
        Self::antialias(word, &mut links, options);
        Ok(links)
    }

    /// Drop links that share the folded key of `word` but differ from it once
    /// case (and, unless `options` say otherwise, diacritics and surrounding
    /// punctuation) are taken into account. Surviving links get their prefix
    /// merged into the word.
    pub fn antialias(word: &str, links: &mut Vec<WordArticleLink>, options: MatchOptions) {
        let target = antialias_form(word, options);

        links.retain_mut(|link| {
            if antialias_form(&link.full_word(), options) != target {
                return false;
            }
            if !link.prefix.is_empty() {
                link.word = link.full_word();
                link.prefix.clear();
            }
            true
        });
    }

    /// Visit every link in key order, stopping early when `visit` breaks or
    /// `cancel` is set.
    fn for_each_link(
        &self,
        cancel: Option<&CancelToken>,
        mut visit: impl FnMut(WordArticleLink) -> ControlFlow<()>,
    ) -> Result<()> {
        let Some(ChainLookup { mut cursor, .. }) = self.find_chain_offset_exact_or_prefix("")? else {
            return Ok(());
        };

        loop {
            for link in cursor.read_chain()? {
                if is_cancelled(cancel) {
                    return Ok(());
                }
                if visit(link).is_break() {
                    return Ok(());
                }
            }

            if cursor.leaf_exhausted() && !cursor.advance_leaf()? {
                return Ok(());
            }
        }
    }

    /// Every headword in the index, prefixes included
    pub fn get_all_headwords(&self, cancel: Option<&CancelToken>) -> Result<AHashSet<String>> {
        let mut headwords = AHashSet::new();
        self.for_each_link(cancel, |link| {
            headwords.insert(link.full_word());
            ControlFlow::Continue(())
        })?;
        Ok(headwords)
    }

    /// One link per distinct article offset, in key order, with prefixes
    /// merged into the words
    pub fn find_all_article_links(&self, cancel: Option<&CancelToken>) -> Result<Vec<WordArticleLink>> {
        let mut seen = RoaringBitmap::new();
        let mut links = Vec::new();

        self.for_each_link(cancel, |link| {
            if seen.insert(link.article_offset) {
                links.push(WordArticleLink::new(link.full_word(), link.article_offset));
            }
            ControlFlow::Continue(())
        })?;

        Ok(links)
    }

    /// Resolve article offsets back to headwords.
    ///
    /// The scan stops as soon as every offset has been seen once; each
    /// headword is reported once, in index order.
    pub fn headwords_from_offsets(&self, offsets: &[u32], cancel: Option<&CancelToken>) -> Result<Vec<String>> {
        let mut pending: RoaringBitmap = offsets.iter().copied().collect();
        let mut reported = AHashSet::new();
        let mut headwords = Vec::new();

        if pending.is_empty() {
            return Ok(headwords);
        }

        self.for_each_link(cancel, |link| {
            if pending.remove(link.article_offset) {
                let word = link.full_word();
                if reported.insert(word.clone()) {
                    headwords.push(word);
                }
            }
            if pending.is_empty() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        Ok(headwords)
    }

    /// Offsets of the nodes right below the root (the leaves of a two-level
    /// tree), or the root itself when it is a leaf
    pub fn leaf_node_offsets(&self) -> Result<Vec<u32>> {
        Ok(match self.root()? {
            Node::Leaf(_) => vec![self.root_offset],
            Node::Internal(node) => node.children().to_vec(),
        })
    }

    /// Collect headwords one top-level subtree at a time, starting at
    /// `*cursor`, until `headwords` holds at least `limit` entries. `cursor`
    /// is advanced past every subtree consumed so the next call continues.
    pub fn find_headwords_paged(
        &self,
        cursor: &mut usize,
        headwords: &mut AHashSet<String>,
        limit: usize,
    ) -> Result<()> {
        let nodes = self.leaf_node_offsets()?;

        while let Some(&offset) = nodes.get(*cursor) {
            self.collect_subtree_headwords(offset, headwords)?;
            *cursor += 1;

            if headwords.len() >= limit {
                break;
            }
        }

        Ok(())
    }

    fn collect_subtree_headwords(&self, offset: u32, headwords: &mut AHashSet<String>) -> Result<()> {
        match self.read_node(offset)? {
            Node::Internal(node) => {
                for &child in node.children() {
                    check_child_offset(offset, child)?;
                    self.collect_subtree_headwords(child, headwords)?;
                }
            }
            Node::Leaf(leaf) => {
                for pos in leaf.chain_starts()? {
                    let (chain, _) = leaf.read_chain(pos, 0)?;
                    headwords.extend(chain.iter().map(WordArticleLink::full_word));
                }
            }
        }
        Ok(())
    }
}

fn pick_child(node: &InternalNode, target: &str) -> u32 {
    if target.is_empty() {
        node.first_child()
    } else {
        node.child_for(target)
    }
}

/// Case-folded form used when comparing a query with candidate headwords
fn antialias_form(word: &str, options: MatchOptions) -> String {
    let nfc: String = word.nfc().collect();
    let mut form = folding::apply_simple_case_only(&nfc);
    if options.ignore_diacritics {
        form = folding::apply_diacritics_only(&form);
    }
    if options.ignore_punctuation {
        form = folding::trim_whitespace_or_punct(&form);
    }
    form
}

struct Descent<'a> {
    leaf: Cow<'a, LeafNode>,
    offset: u32,
    at_root: bool,
}

impl<'a> Descent<'a> {
    fn new(leaf: Cow<'a, LeafNode>, offset: u32, index: &BtreeIndex) -> Self {
        Self {
            leaf,
            offset,
            at_root: offset == index.root_offset,
        }
    }
}

/// Result of [`BtreeIndex::find_chain_offset_exact_or_prefix`]
pub struct ChainLookup<'a> {
    /// The chain's key equals the target
    pub exact_match: bool,
    /// Positioned on the found chain
    pub cursor: ChainCursor<'a>,
}

impl<'a> ChainLookup<'a> {
    fn new(exact_match: bool, cursor: ChainCursor<'a>) -> Self {
        Self { exact_match, cursor }
    }
}

/// Forward position in the chain sequence of the index: a leaf plus an
/// offset into it, able to follow leaf links.
pub struct ChainCursor<'a> {
    index: &'a BtreeIndex,
    leaf: Cow<'a, LeafNode>,
    leaf_offset: u32,
    pos: usize,
}

impl<'a> ChainCursor<'a> {
    fn new(index: &'a BtreeIndex, leaf: Cow<'a, LeafNode>, leaf_offset: u32, pos: usize) -> Self {
        Self {
            index,
            leaf,
            leaf_offset,
            pos,
        }
    }

    /// Decode the current chain and move to the next one
    pub fn read_chain(&mut self) -> Result<Vec<WordArticleLink>> {
        self.read_chain_limited(0)
    }

    /// Like [`read_chain`](Self::read_chain), decoding at most `max_count`
    /// links when it is non-zero
    pub fn read_chain_limited(&mut self, max_count: usize) -> Result<Vec<WordArticleLink>> {
        let (links, next) = self.leaf.read_chain(self.pos, max_count)?;
        self.pos = next;
        Ok(links)
    }

    /// First word of the current chain
    pub fn chain_head(&self) -> Result<Cow<'_, str>> {
        self.leaf.chain_head(self.pos)
    }

    /// No chains left in the current leaf
    pub fn leaf_exhausted(&self) -> bool {
        self.pos >= self.leaf.end()
    }

    /// Offset of the leaf after the current one, 0 if this is the last
    pub fn next_leaf(&self) -> u32 {
        self.leaf.next_leaf()
    }

    /// Load the next leaf and point at its first chain. Returns `false` when
    /// the current leaf is the last one.
    pub fn advance_leaf(&mut self) -> Result<bool> {
        let next = self.leaf.next_leaf();
        if next == 0 {
            return Ok(false);
        }
        // Leaves are written in key order, so links only ever point forward
        if next <= self.leaf_offset {
            return Err(IndexError::corrupted(format!(
                "leaf at {} links back to {}",
                self.leaf_offset, next
            )));
        }

        let leaf = match self.index.read_node(next)? {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => {
                return Err(IndexError::corrupted(format!(
                    "leaf link at {} points to an internal node",
                    next
                )));
            }
        };
        if leaf.is_empty() {
            return Err(IndexError::corrupted(format!("linked leaf at {} is empty", next)));
        }

        self.pos = leaf.first_chain();
        self.leaf = Cow::Owned(leaf);
        self.leaf_offset = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::storage::MemoryStorage;
    use crate::index::words::IndexedWords;
    use crate::index::writer::build_index;
    use std::io::Cursor;

    fn index_of(words: &IndexedWords) -> BtreeIndex {
        let mut out = Cursor::new(Vec::new());
        let info = build_index(words, &mut out).unwrap();
        BtreeIndex::open(&info, MemoryStorage::new(out.into_inner())).unwrap()
    }

    fn sample() -> BtreeIndex {
        let mut words = IndexedWords::new();
        words.add_word("cat", 100, 256);
        words.add_word("car", 200, 256);
        words.add_word("care", 300, 256);
        index_of(&words)
    }

    fn numbered(count: usize) -> BtreeIndex {
        let mut words = IndexedWords::new();
        for i in 0..count {
            words.add_single_word(&format!("w{:05}", i), i as u32);
        }
        index_of(&words)
    }

    #[test]
    fn test_unopened_index() {
        let index = BtreeIndex::new();
        assert!(!index.is_open());
        assert!(matches!(
            index.find_chain_offset_exact_or_prefix("a"),
            Err(IndexError::IndexNotOpened)
        ));
        assert!(matches!(index.get_all_headwords(None), Err(IndexError::IndexNotOpened)));
        assert!(index.find_articles("a", MatchOptions::default(), 0).is_empty());
    }

    #[test]
    fn test_exact_and_prefix_lookup() {
        let index = sample();

        let mut hit = index.find_chain_offset_exact_or_prefix("car").unwrap().unwrap();
        assert!(hit.exact_match);
        assert_eq!(hit.cursor.read_chain().unwrap(), [WordArticleLink::new("car", 200)]);

        let mut hit = index.find_chain_offset_exact_or_prefix("ca").unwrap().unwrap();
        assert!(!hit.exact_match);
        assert_eq!(hit.cursor.chain_head().unwrap(), "car");
        hit.cursor.read_chain().unwrap();
        assert!(!hit.cursor.leaf_exhausted());

        let hit = index.find_chain_offset_exact_or_prefix("cas").unwrap().unwrap();
        assert_eq!(hit.cursor.chain_head().unwrap(), "cat");

        assert!(index.find_chain_offset_exact_or_prefix("dog").unwrap().is_none());
    }

    #[test]
    fn test_empty_target_gives_first_chain() {
        let index = sample();
        let hit = index.find_chain_offset_exact_or_prefix("").unwrap().unwrap();
        assert!(!hit.exact_match);
        assert_eq!(hit.cursor.chain_head().unwrap(), "car");
        assert_eq!(hit.cursor.next_leaf(), 0);
    }

    #[test]
    fn test_lookup_crosses_into_next_leaf() {
        let index = numbered(1000);

        // Every key is found exactly, whichever leaf holds it
        for i in [0, 1, 15, 16, 499, 998, 999] {
            let key = format!("w{:05}", i);
            let hit = index.find_chain_offset_exact_or_prefix(&key).unwrap().unwrap();
            assert!(hit.exact_match, "{}", key);
            assert_eq!(hit.cursor.chain_head().unwrap(), key);
        }

        // Between two keys: the following key, even across a leaf boundary
        for i in 0..999 {
            let between = format!("w{:05}a", i);
            let hit = index.find_chain_offset_exact_or_prefix(&between).unwrap().unwrap();
            assert!(!hit.exact_match);
            assert_eq!(hit.cursor.chain_head().unwrap(), format!("w{:05}", i + 1));
        }

        assert!(index.find_chain_offset_exact_or_prefix("w00999a").unwrap().is_none());
    }

    #[test]
    fn test_find_articles_antialias() {
        let mut words = IndexedWords::new();
        words.add_word("Café", 1, 256);
        words.add_word("cafe", 2, 256);
        words.add_word("CAFE!", 3, 256);
        let index = index_of(&words);

        let strict = MatchOptions::default();
        let found = index.find_articles("cafe", strict, 0);
        assert_eq!(found, [WordArticleLink::new("cafe", 2)]);

        let loose = MatchOptions {
            ignore_diacritics: true,
            ignore_punctuation: true,
        };
        let offsets: Vec<u32> = index
            .find_articles("cafe", loose, 0)
            .iter()
            .map(|l| l.article_offset)
            .collect();
        assert_eq!(offsets, [1, 2, 3]);

        assert_eq!(index.find_articles("cafe", loose, 2).len(), 2);
        assert!(index.find_articles("caf", loose, 0).is_empty());
    }

    #[test]
    fn test_antialias_merges_prefix() {
        let mut links = vec![
            WordArticleLink::with_prefix("cream", 1, "ice "),
            WordArticleLink::with_prefix("cream", 2, "sour "),
        ];
        BtreeIndex::antialias("Ice Cream", &mut links, MatchOptions::default());
        assert_eq!(links, [WordArticleLink::new("ice cream", 1)]);
    }

    #[test]
    fn test_bulk_traversal() {
        let mut words = IndexedWords::new();
        words.add_word("ice cream", 10, 256);
        words.add_word("cream", 20, 256);
        let index = index_of(&words);

        let headwords = index.get_all_headwords(None).unwrap();
        let mut sorted: Vec<_> = headwords.into_iter().collect();
        sorted.sort();
        assert_eq!(sorted, ["cream", "ice cream"]);

        // "cream" chain holds offsets 10 (middle match) and 20; the 10 is
        // reported once, under the first key visited
        let links = index.find_all_article_links(None).unwrap();
        assert_eq!(
            links,
            [
                WordArticleLink::new("ice cream", 10),
                WordArticleLink::new("cream", 20),
            ]
        );
    }

    #[test]
    fn test_cancelled_traversal_stops() {
        let index = numbered(500);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(index.get_all_headwords(Some(&cancel)).unwrap().is_empty());
        assert_eq!(index.get_all_headwords(None).unwrap().len(), 500);
    }

    #[test]
    fn test_headwords_from_offsets() {
        let index = numbered(300);
        let found = index.headwords_from_offsets(&[250, 3, 3, 9999], None).unwrap();
        assert_eq!(found, ["w00003", "w00250"]);
        assert!(index.headwords_from_offsets(&[], None).unwrap().is_empty());
    }

    #[test]
    fn test_paged_headwords() {
        let index = numbered(1000);
        let nodes = index.leaf_node_offsets().unwrap();
        assert_eq!(nodes.len(), index.node_size() + 1);

        let mut cursor = 0;
        let mut page = AHashSet::new();
        index.find_headwords_paged(&mut cursor, &mut page, 40).unwrap();
        assert!(page.len() >= 40);
        assert!(cursor > 0 && cursor < nodes.len());

        let mut all = page.clone();
        index.find_headwords_paged(&mut cursor, &mut all, usize::MAX).unwrap();
        assert_eq!(cursor, nodes.len());
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_single_leaf_offsets() {
        let index = sample();
        assert_eq!(index.leaf_node_offsets().unwrap(), [index.root_offset()]);
    }
}
