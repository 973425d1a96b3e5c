//! Index builder: writes an [`IndexedWords`] collection as a compressed
//! B-tree, children before parents, leaves linked left to right.

use crate::index::error::{IndexError, Result};
use crate::index::node::{compress, encode_internal, encode_leaf};
use crate::index::types::{BTREE_MAX_ELEMENTS, BTREE_MIN_ELEMENTS, IndexInfo, WordArticleLink};
use crate::index::words::IndexedWords;
use crate::utils::encoding::write_u32_le;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

type Entry<'a> = (&'a str, &'a [WordArticleLink]);

/// Node size for `key_count` keys: about `sqrt(N)` so typical dictionaries
/// end up with a two-level tree.
pub fn branching_factor(key_count: usize) -> usize {
    let size = (key_count as f64).sqrt().round() as usize + 1;
    size.clamp(BTREE_MIN_ELEMENTS, BTREE_MAX_ELEMENTS)
}

/// Write the B-tree for `words` at the current position of `out`.
///
/// Offsets stored in the tree are absolute positions in `out`. Entries with
/// an empty key are not indexed.
pub fn build_index<W: Write + Seek>(words: &IndexedWords, out: &mut W) -> Result<IndexInfo> {
    let entries: Vec<Entry<'_>> = words
        .iter()
        .map(|(key, chain)| (key.as_str(), chain.as_slice()))
        .skip_while(|(key, _)| key.is_empty())
        .collect();

    let node_size = branching_factor(entries.len());
    debug!(keys = entries.len(), node_size, "Building btree index");

    let mut builder = TreeWriter {
        out,
        node_size,
        last_leaf_link: None,
    };
    let root_offset = builder.write_subtree(&entries)?;

    Ok(IndexInfo::new(node_size as u32, root_offset))
}

/// Build an index into a new file at `path`
pub fn build_index_file(words: &IndexedWords, path: &Path) -> Result<IndexInfo> {
    let mut file = BufWriter::new(File::create(path)?);
    let info = build_index(words, &mut file)?;
    file.flush()?;
    Ok(info)
}

struct TreeWriter<'w, W> {
    out: &'w mut W,
    node_size: usize,
    /// Where the previously written leaf keeps its next-leaf link
    last_leaf_link: Option<u64>,
}

impl<W: Write + Seek> TreeWriter<'_, W> {
    fn write_subtree(&mut self, entries: &[Entry<'_>]) -> Result<u32> {
        if entries.len() <= self.node_size {
            return self.write_leaf(entries);
        }

        let total = entries.len();
        let mut children = Vec::with_capacity(self.node_size + 1);
        let mut separators = Vec::with_capacity(self.node_size);
        let mut prev = 0;

        for i in 0..self.node_size {
            let cur = total * (i + 1) / (self.node_size + 1);
            children.push(self.write_subtree(&entries[prev..cur])?);
            // First key of the next child
            separators.push(entries[cur].0);
            prev = cur;
        }
        children.push(self.write_subtree(&entries[prev..])?);

        self.write_node(&encode_internal(&children, &separators))
    }

    fn write_leaf(&mut self, entries: &[Entry<'_>]) -> Result<u32> {
        let offset = self.write_node(&encode_leaf(entries))?;

        // Link placeholder, patched once the next leaf is written
        write_u32_le(self.out, 0)?;
        let here = self.out.stream_position()?;

        if let Some(link) = self.last_leaf_link {
            self.out.seek(SeekFrom::Start(link))?;
            write_u32_le(self.out, offset)?;
            self.out.seek(SeekFrom::Start(here))?;
        }
        self.last_leaf_link = Some(here - 4);

        Ok(offset)
    }

    /// Write `[uncompressed][compressed][zlib]`, returning the node offset
    fn write_node(&mut self, body: &[u8]) -> Result<u32> {
        let compressed = compress(body).map_err(IndexError::BuildCompression)?;

        let offset = self.out.stream_position()?;
        let offset = u32::try_from(offset)
            .map_err(|_| io::Error::other(format!("index offset {} exceeds 4 GiB", offset)))?;

        write_u32_le(self.out, body.len() as u32)?;
        write_u32_le(self.out, compressed.len() as u32)?;
        self.out.write_all(&compressed)?;

        Ok(offset)
    }
}
