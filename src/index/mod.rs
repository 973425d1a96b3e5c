//! The on-disk B-tree headword index.
//!
//! - [`words`] - in-memory collection of headwords to index
//! - [`writer`] - builds the tree into a file
//! - [`build`] - builds an index from a headword list file
//! - [`node`] - node layout, compression and decoding
//! - [`storage`] - byte sources an index can be read from
//! - [`reader`] - lookups and leaf scans over a built tree
//! - [`stats`] - tree shape and size reporting

pub mod build;
pub mod error;
pub mod node;
pub mod reader;
pub mod stats;
pub mod storage;
pub mod types;
pub mod words;
pub mod writer;

pub use build::{BuildSummary, build_from_file};
pub use error::{IndexError, Result};
pub use reader::{BtreeIndex, ChainCursor, ChainLookup};
pub use storage::{FileStorage, IndexStorage, MemoryStorage, MmapStorage};
pub use types::*;
pub use words::IndexedWords;
pub use writer::{build_index, build_index_file};
