use crate::index::error::Result;
use crate::index::node::{Node, check_child_offset};
use crate::index::reader::BtreeIndex;
use crate::index::types::IndexInfo;
use anyhow::Context;
use std::path::Path;

/// Shape and size of an index tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub node_size: usize,
    pub root_offset: u32,
    /// Levels including the leaf level
    pub depth: usize,
    pub internal_nodes: usize,
    pub leaves: usize,
    pub chains: usize,
    pub entries: usize,
    pub compressed_bytes: u64,
    pub uncompressed_bytes: u64,
}

/// Walk every node of an opened index
pub fn collect_stats(index: &BtreeIndex) -> Result<IndexStats> {
    let mut stats = IndexStats {
        node_size: index.node_size(),
        root_offset: index.root_offset(),
        ..Default::default()
    };
    visit(index, index.root_offset(), 1, &mut stats)?;
    Ok(stats)
}

fn visit(index: &BtreeIndex, offset: u32, level: usize, stats: &mut IndexStats) -> Result<()> {
    let (uncompressed, compressed) = index.read_node_header(offset)?;
    stats.uncompressed_bytes += uncompressed as u64;
    stats.compressed_bytes += compressed as u64;
    stats.depth = stats.depth.max(level);

    match index.read_node(offset)? {
        Node::Internal(node) => {
            stats.internal_nodes += 1;
            for &child in node.children() {
                check_child_offset(offset, child)?;
                visit(index, child, level + 1, stats)?;
            }
        }
        Node::Leaf(leaf) => {
            stats.leaves += 1;
            for pos in leaf.chain_starts()? {
                stats.chains += 1;
                stats.entries += leaf.read_chain(pos, 0)?.0.len();
            }
        }
    }
    Ok(())
}

/// Display statistics for the index file at `index_path`
pub fn show_stats(index_path: &Path) -> anyhow::Result<()> {
    let info_path = IndexInfo::path_for(index_path);
    let info = IndexInfo::load(&info_path)
        .with_context(|| format!("Failed to read {}", info_path.display()))?;
    let index = BtreeIndex::open_mmap(&info, index_path)
        .with_context(|| format!("Failed to open {}", index_path.display()))?;
    let stats = collect_stats(&index)?;
    let file_size = std::fs::metadata(index_path)?.len();

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index file:       {}", index_path.display());
    println!("File size:        {}", format_size(file_size));
    println!("Node size:        {}", stats.node_size);
    println!("Root offset:      {}", stats.root_offset);
    println!("Depth:            {}", stats.depth);
    println!("Internal nodes:   {}", stats.internal_nodes);
    println!("Leaves:           {}", stats.leaves);
    println!("Keys:             {}", stats.chains);
    println!("Entries:          {}", stats.entries);
    println!();
    println!("Uncompressed:     {}", format_size(stats.uncompressed_bytes));
    println!("Compressed:       {}", format_size(stats.compressed_bytes));
    if stats.uncompressed_bytes > 0 {
        println!(
            "Ratio:            {:.1}%",
            stats.compressed_bytes as f64 * 100.0 / stats.uncompressed_bytes as f64
        );
    }

    Ok(())
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
