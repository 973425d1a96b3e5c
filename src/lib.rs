//! # wordex - Headword Index for Dictionaries
//!
//! wordex stores the headwords of a dictionary in a compressed, read-only
//! B-tree on disk and answers exact, prefix, stemmed and wildcard lookups
//! over it without loading the whole list into memory.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Folded headword collection, tree builder, node codec and reader
//! - [`query`] - Cancellable background word searches and wildcard patterns
//! - [`dictionary`] - A named index plus match options and a search pool
//! - [`output`] - Result formatting for the command line
//! - [`utils`] - Text folding, little-endian encoding, cancellation, config
//!
//! ## Quick Start
//!
//! ```
//! use std::io::Cursor;
//! use wordex::index::{BtreeIndex, IndexedWords, MatchOptions, MemoryStorage, build_index};
//!
//! let mut words = IndexedWords::new();
//! words.add_word("Cat", 10, 256);
//! words.add_word("ice cream", 20, 256);
//!
//! let mut out = Cursor::new(Vec::new());
//! let info = build_index(&words, &mut out).unwrap();
//! let index = BtreeIndex::open(&info, MemoryStorage::new(out.into_inner())).unwrap();
//!
//! let links = index.find_articles("cat", MatchOptions::default(), 0);
//! assert_eq!(links.len(), 1);
//! assert_eq!(links[0].article_offset, 10);
//! ```
//!
//! ## On-disk layout
//!
//! Every node is a zlib-compressed body preceded by its uncompressed and
//! compressed sizes. Leaves hold chains of entries sharing one folded key and
//! end with a link to the next leaf, so a range scan never climbs back up the
//! tree. Internal nodes hold child offsets and separator keys.

pub mod dictionary;
pub mod index;
pub mod output;
pub mod query;
pub mod utils;

pub use dictionary::Dictionary;
