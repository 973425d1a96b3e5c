use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wordex::index::build::build_from_file;
use wordex::index::stats::show_stats;
use wordex::output;
use wordex::query::{SearchParams, WordSearchRequest, search_pool};
use wordex::utils::AppConfig;
use wordex::Dictionary;

#[derive(Parser)]
#[command(name = "wordex")]
#[command(about = "Compressed B-tree headword index with prefix, stemmed and wildcard search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a headword list (`headword[\toffset]` per line)
    Build {
        /// Headword list
        input: PathBuf,

        /// Index file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Exact lookup of a headword
    Find {
        /// Index file
        index: PathBuf,

        word: String,

        /// Maximum number of articles (0 = unlimited)
        #[arg(short = 'n', long, default_value_t = 0)]
        max: usize,
    },
    /// Headwords starting with a word (wildcards allowed)
    Prefix {
        /// Index file
        index: PathBuf,

        word: String,

        /// Maximum number of matches
        #[arg(short = 'n', long)]
        max: Option<usize>,
    },
    /// Headwords sharing a stem with a word
    Stem {
        /// Index file
        index: PathBuf,

        word: String,

        /// Never chop the word below this many characters
        #[arg(long)]
        min_length: Option<usize>,

        /// Trailing characters that may be chopped off
        #[arg(long)]
        max_suffix: Option<usize>,

        /// Maximum number of matches
        #[arg(short = 'n', long)]
        max: Option<usize>,
    },
    /// List every headword
    Headwords {
        /// Index file
        index: PathBuf,
    },
    /// Show index statistics
    Stats {
        /// Index file
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let color = !cli.no_color;

    match cli.command {
        Commands::Build { input, output } => {
            let summary = build_from_file(&input, &output, config.max_headword_size, false)?;
            println!(
                "Indexed {} headwords ({} keys) into {}",
                summary.headwords,
                summary.keys,
                output.display()
            );
            if summary.skipped_lines > 0 {
                println!("Skipped {} lines", summary.skipped_lines);
            }
        }
        Commands::Find { index, word, max } => {
            let dict = open_dictionary(&index, &config)?;
            let links = dict.find_articles(&word, max);
            output::print_links(&links, color)?;
        }
        Commands::Prefix { index, word, max } => {
            let dict = open_dictionary(&index, &config)?;
            let request = dict.prefix_match(&word, max.unwrap_or(config.max_results));
            print_request(&request, color)?;
        }
        Commands::Stem {
            index,
            word,
            min_length,
            max_suffix,
            max,
        } => {
            let dict = open_dictionary(&index, &config)?;
            let request = dict.search(SearchParams::stemmed(
                word,
                min_length.unwrap_or(config.min_stem_length),
                max_suffix.unwrap_or(config.max_suffix_variation),
                max.unwrap_or(config.max_results),
            ));
            print_request(&request, color)?;
        }
        Commands::Headwords { index } => {
            let dict = open_dictionary(&index, &config)?;
            output::print_headwords(&dict.get_headwords())?;
        }
        Commands::Stats { index } => {
            show_stats(&index)?;
        }
    }

    Ok(())
}

fn open_dictionary(index: &Path, config: &AppConfig) -> Result<Dictionary> {
    let pool = search_pool(config.effective_worker_threads()).context("Failed to start search workers")?;
    let name = index
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let dict = Dictionary::open(name, index, Arc::new(pool)).with_options(config.match_options());
    if let Some(error) = dict.init_error() {
        bail!("Failed to open {}: {}", index.display(), error);
    }
    Ok(dict)
}

fn print_request(request: &WordSearchRequest, color: bool) -> Result<()> {
    request.wait();
    if let Some(error) = request.error_string() {
        bail!("Search failed: {}", error);
    }
    output::print_matches(&request.results(), color)?;
    Ok(())
}
