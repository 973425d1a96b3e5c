use std::io;
use thiserror::Error;

/// Errors raised while building or reading a B-tree index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index was not opened")]
    IndexNotOpened,

    #[error("failed to decompress btree node at offset {offset}")]
    Decompression { offset: u32 },

    #[error("corrupted chain data: {0}")]
    CorruptedChain(String),

    #[error("failed to compress btree node")]
    BuildCompression(#[source] io::Error),

    #[error("invalid index info: {0}")]
    InvalidInfo(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IndexError {
    pub(crate) fn corrupted(message: impl Into<String>) -> Self {
        IndexError::CorruptedChain(message.into())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
