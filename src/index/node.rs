//! B-tree node codec.
//!
//! Every node is stored as
//!
//! ```text
//! [uncompressed size: u32][compressed size: u32][zlib(body)]
//! ```
//!
//! and leaves are additionally followed by a raw `u32` link to the next leaf
//! (0 for the last one). Bodies come in two kinds:
//!
//! ```text
//! leaf:     [entry count][chain]*
//! chain:    [byte size]([word\0][prefix\0][article offset])*
//! internal: [0xFFFFFFFF][child offset] * (M + 1)[separator\0] * M
//! ```
//!
//! All integers are little-endian. `M` is the node size recorded in
//! [`IndexInfo`](crate::index::IndexInfo); child `i` holds keys below
//! separator `i`, the last child holds everything from the last separator on.

use crate::index::error::{IndexError, Result};
use crate::index::types::{INTERNAL_NODE_MARKER, WordArticleLink};
use crate::utils::encoding::{patch_u32_le, put_cstr, put_u32_le};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::borrow::Cow;
use std::io::{self, Read, Write};

/// Size of the `[uncompressed][compressed]` node header
pub const NODE_HEADER_SIZE: u64 = 8;

/// Forward-only reader over a decoded node body. Every read checks the
/// remaining length first.
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(IndexError::corrupted(format!(
                "truncated u32 at byte {} of {}",
                self.pos,
                self.buf.len()
            )));
        }
        let bytes = [
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ];
        self.pos += 4;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Read a NUL-terminated string. Invalid UTF-8 is replaced rather than
    /// rejected, since a damaged headword should not hide its neighbours.
    pub fn read_cstr(&mut self) -> Result<Cow<'a, str>> {
        let rest = self.buf.get(self.pos..).unwrap_or_default();
        let len = memchr::memchr(0, rest).ok_or_else(|| {
            IndexError::corrupted(format!("unterminated string at byte {}", self.pos))
        })?;
        let s = String::from_utf8_lossy(&rest[..len]);
        self.pos += len + 1;
        Ok(s)
    }
}

/// A decoded node; the kind is resolved once when the node is read
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    /// Decode a decompressed node body.
    ///
    /// `next_leaf` is only called for leaves: the link lives in the file right
    /// after the compressed bytes, outside the body.
    pub fn decode(
        body: Vec<u8>,
        node_size: usize,
        next_leaf: impl FnOnce() -> Result<u32>,
    ) -> Result<Node> {
        let marker = ByteCursor::new(&body).read_u32()?;

        if marker == INTERNAL_NODE_MARKER {
            Ok(Node::Internal(InternalNode::decode(&body, node_size)?))
        } else {
            Ok(Node::Leaf(LeafNode {
                entry_count: marker,
                next_leaf: next_leaf()?,
                data: body,
            }))
        }
    }
}

/// A leaf: sorted chains plus the link to the following leaf
#[derive(Debug, Clone)]
pub struct LeafNode {
    data: Vec<u8>,
    entry_count: u32,
    next_leaf: u32,
}

impl LeafNode {
    #[inline]
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// File offset of the next leaf, 0 for the last one
    #[inline]
    pub fn next_leaf(&self) -> u32 {
        self.next_leaf
    }

    /// Position of the first chain inside the body
    #[inline]
    pub fn first_chain(&self) -> usize {
        4
    }

    /// End of the body; a chain position at or past it means the leaf is done
    #[inline]
    pub fn end(&self) -> usize {
        self.data.len()
    }

    /// Start positions of every chain, found by hopping over chain sizes
    pub fn chain_starts(&self) -> Result<Vec<usize>> {
        // Each chain takes at least its 4-byte size
        let mut starts = Vec::with_capacity((self.entry_count as usize).min(self.data.len() / 4));
        let mut pos = self.first_chain();

        for _ in 0..self.entry_count {
            starts.push(pos);
            let size = ByteCursor::at(&self.data, pos).read_u32()? as usize;
            pos = pos
                .checked_add(4 + size)
                .filter(|&end| end <= self.data.len())
                .ok_or_else(|| {
                    IndexError::corrupted(format!("chain at byte {} overruns its leaf", pos))
                })?;
        }

        if pos != self.data.len() {
            return Err(IndexError::corrupted(format!(
                "leaf declares {} chains but has {} trailing bytes",
                self.entry_count,
                self.data.len() - pos
            )));
        }

        Ok(starts)
    }

    /// First word of the chain starting at `pos`
    pub fn chain_head(&self, pos: usize) -> Result<Cow<'_, str>> {
        let mut cursor = ByteCursor::at(&self.data, pos);
        cursor.read_u32()?;
        cursor.read_cstr()
    }

    /// Decode the chain at `pos`, stopping after `max_count` entries when it
    /// is non-zero. Returns the entries and the position of the next chain.
    pub fn read_chain(&self, pos: usize, max_count: usize) -> Result<(Vec<WordArticleLink>, usize)> {
        let mut cursor = ByteCursor::at(&self.data, pos);
        let chain_size = cursor.read_u32()? as usize;

        let chain_end = pos
            .checked_add(4 + chain_size)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| IndexError::corrupted(format!("chain at byte {} overruns its leaf", pos)))?;

        let mut links = Vec::new();
        let mut left = chain_size;

        while left > 0 && (max_count == 0 || links.len() < max_count) {
            let entry_start = cursor.position();
            let word = cursor.read_cstr()?.into_owned();
            let prefix = cursor.read_cstr()?.into_owned();
            let article_offset = cursor.read_u32()?;
            let entry_size = cursor.position() - entry_start;

            if left < entry_size {
                return Err(IndexError::corrupted(format!(
                    "chain at byte {} declares {} bytes but its entries need more",
                    pos, chain_size
                )));
            }
            left -= entry_size;

            links.push(WordArticleLink::with_prefix(word, article_offset, prefix));
        }

        Ok((links, chain_end))
    }
}

/// An internal node: child offsets and the separators between them
#[derive(Debug, Clone)]
pub struct InternalNode {
    children: Vec<u32>,
    separators: Vec<String>,
}

impl InternalNode {
    fn decode(body: &[u8], node_size: usize) -> Result<Self> {
        let mut cursor = ByteCursor::at(body, 4);

        let mut children = Vec::with_capacity(node_size + 1);
        for _ in 0..=node_size {
            children.push(cursor.read_u32()?);
        }

        let mut separators = Vec::with_capacity(node_size);
        while cursor.remaining() > 0 {
            separators.push(cursor.read_cstr()?.into_owned());
        }

        if separators.len() != node_size {
            return Err(IndexError::corrupted(format!(
                "internal node has {} separators, expected {}",
                separators.len(),
                node_size
            )));
        }

        Ok(Self {
            children,
            separators,
        })
    }

    pub fn children(&self) -> &[u32] {
        &self.children
    }

    pub fn separators(&self) -> &[String] {
        &self.separators
    }

    #[inline]
    pub fn first_child(&self) -> u32 {
        self.children[0]
    }

    /// Child to descend into for `target`. A target equal to a separator
    /// goes right, since separators are the first keys of their right child.
    pub fn child_for(&self, target: &str) -> u32 {
        let idx = self
            .separators
            .partition_point(|sep| sep.as_str() <= target);
        self.children[idx]
    }
}

/// Children are always written before their parent. Anything else would let
/// a damaged file send a traversal around in circles.
pub fn check_child_offset(parent: u32, child: u32) -> Result<()> {
    if child >= parent {
        return Err(IndexError::corrupted(format!(
            "node at {} has child at {}, not before it",
            parent, child
        )));
    }
    Ok(())
}

/// Serialize a leaf body from `(folded key, chain)` pairs in key order
pub fn encode_leaf(entries: &[(&str, &[WordArticleLink])]) -> Vec<u8> {
    let total: usize = entries
        .iter()
        .map(|(_, chain)| 4 + chain.iter().map(WordArticleLink::encoded_len).sum::<usize>())
        .sum();

    let mut body = Vec::with_capacity(4 + total);
    put_u32_le(&mut body, entries.len() as u32);

    for (_, chain) in entries {
        let size_at = body.len();
        put_u32_le(&mut body, 0);

        for link in chain.iter() {
            put_cstr(&mut body, &link.word);
            put_cstr(&mut body, &link.prefix);
            put_u32_le(&mut body, link.article_offset);
        }

        let chain_size = (body.len() - size_at - 4) as u32;
        patch_u32_le(&mut body, size_at, chain_size);
    }

    body
}

/// Serialize an internal node body
pub fn encode_internal(children: &[u32], separators: &[&str]) -> Vec<u8> {
    debug_assert_eq!(children.len(), separators.len() + 1);

    let sep_bytes: usize = separators.iter().map(|s| s.len() + 1).sum();
    let mut body = Vec::with_capacity(4 + children.len() * 4 + sep_bytes);

    put_u32_le(&mut body, INTERNAL_NODE_MARKER);
    for &child in children {
        put_u32_le(&mut body, child);
    }
    for sep in separators {
        put_cstr(&mut body, sep);
    }

    body
}

/// Deflate a node body (zlib stream, default level)
pub fn compress(body: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(body.len() / 2 + 64), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

/// Inflate a node body. Returns `None` unless the stream decodes to exactly
/// `uncompressed_size` bytes.
pub fn decompress(compressed: &[u8], uncompressed_size: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(uncompressed_size.min(1 << 20));
    let mut decoder = ZlibDecoder::new(compressed).take(uncompressed_size as u64 + 1);

    match decoder.read_to_end(&mut out) {
        Ok(_) if out.len() == uncompressed_size => Some(out),
        _ => None,
    }
}
