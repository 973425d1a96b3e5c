//! Building an index file from a headword list.
//!
//! Input is UTF-8 text with one headword per line, optionally followed by a
//! tab and the article offset. Lines without an offset use their own byte
//! offset in the input.

use crate::index::types::IndexInfo;
use crate::index::words::IndexedWords;
use crate::index::writer::build_index_file;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// What a build produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub info: IndexInfo,
    /// Headword lines read
    pub headwords: usize,
    /// Lines that could not be used
    pub skipped_lines: usize,
    /// Distinct index keys written
    pub keys: usize,
}

/// Counts from [`load_headwords`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub headwords: usize,
    pub skipped_lines: usize,
}

/// Read `headword[\toffset]` lines into `words`
pub fn load_headwords<R: BufRead>(
    mut reader: R,
    max_headword_size: usize,
    words: &mut IndexedWords,
) -> Result<LoadStats> {
    let mut stats = LoadStats::default();
    let mut line = Vec::new();
    let mut line_start = 0u64;
    let mut line_no = 0usize;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let offset_of_line = line_start;
        line_start += read as u64;

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\n', '\r']);
        if text.trim().is_empty() {
            continue;
        }

        let (headword, offset) = match text.split_once('\t') {
            Some((headword, offset)) => match offset.trim().parse::<u32>() {
                Ok(offset) => (headword, offset),
                Err(_) => {
                    warn!(line = line_no, offset, "Skipped line with a bad article offset");
                    stats.skipped_lines += 1;
                    continue;
                }
            },
            None => match u32::try_from(offset_of_line) {
                Ok(offset) => (text, offset),
                Err(_) => {
                    warn!(line = line_no, "Skipped line past the 4 GiB offset range");
                    stats.skipped_lines += 1;
                    continue;
                }
            },
        };

        words.add_word(headword, offset, max_headword_size);
        stats.headwords += 1;
    }

    Ok(stats)
}

/// Build `output` (and its info file) from the headword list at `input`
pub fn build_from_file(input: &Path, output: &Path, max_headword_size: usize, silent: bool) -> Result<BuildSummary> {
    let start = Instant::now();
    let spinner = Spinner::new(silent, format!("Reading {}...", input.display()));

    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let mut words = IndexedWords::new();
    let stats = load_headwords(BufReader::new(file), max_headword_size, &mut words)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    spinner.set_message(format!("Writing {} keys...", words.len()));
    let info = build_index_file(&words, output)
        .with_context(|| format!("Failed to build {}", output.display()))?;

    let info_path = IndexInfo::path_for(output);
    info.save(&info_path)
        .with_context(|| format!("Failed to write {}", info_path.display()))?;

    spinner.finish(format!("Indexed {} headwords", stats.headwords));
    info!(
        headwords = stats.headwords,
        keys = words.len(),
        skipped = stats.skipped_lines,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Index built"
    );

    Ok(BuildSummary {
        info,
        headwords: stats.headwords,
        skipped_lines: stats.skipped_lines,
        keys: words.len(),
    })
}

/// Progress spinner, inert when silent or without the `progress` feature
struct Spinner {
    #[cfg(feature = "progress")]
    bar: Option<indicatif::ProgressBar>,
}

impl Spinner {
    #[cfg(feature = "progress")]
    fn new(silent: bool, message: String) -> Self {
        use indicatif::{ProgressBar, ProgressStyle};

        if silent {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar: Some(bar) }
    }

    #[cfg(not(feature = "progress"))]
    fn new(_silent: bool, _message: String) -> Self {
        Self {}
    }

    #[cfg(feature = "progress")]
    fn set_message(&self, message: String) {
        if let Some(bar) = &self.bar {
            bar.set_message(message);
        }
    }

    #[cfg(not(feature = "progress"))]
    fn set_message(&self, _message: String) {}

    #[cfg(feature = "progress")]
    fn finish(&self, message: String) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message);
        }
    }

    #[cfg(not(feature = "progress"))]
    fn finish(&self, _message: String) {}
}
