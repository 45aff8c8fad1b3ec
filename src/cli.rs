//! CLI parsing and orchestration. Parses args, runs the scrape pipeline, and
//! writes the EPUB to a file or stdout. Maps errors to exit codes.

use crate::config;
use crate::epub::{build_epub, write_epub, EpubError};
use crate::scraper::{Pipeline, PoliteClient, ScrapeOptions, ScraperError};
use clap::Parser;
use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Epub(#[from] EpubError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) => 2,
            CliRunError::Epub(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rrbind")]
#[command(about = "Scrape a Royal Road fiction and bind its chapters into an EPUB")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, request_delay_secs, timeout_secs, retry_count, retry_backoff_secs) are read from ./rrbind.toml or ~/.config/rrbind/config.toml. CLI flags override config."
)]
pub struct Args {
    /// Fiction index URL (the story page listing all chapters).
    pub url: String,

    /// Output path. Default: ./{sanitized-title}.epub.
    #[arg(short, long, conflicts_with = "stdout")]
    pub output: Option<PathBuf>,

    /// Write the EPUB byte stream to stdout instead of a file.
    #[arg(long)]
    pub stdout: bool,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long)]
    pub verbose: bool,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Delay between requests in seconds (overrides config; default 1).
    #[arg(long)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fetch the index only, print chapter count and output path without writing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Derive the output filename from the title: lower-cased, non-alphanumeric
/// characters replaced by underscores, suffixed .epub.
fn epub_filename(title: &str) -> String {
    let stem: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if stem.chars().all(|c| c == '_') {
        return "book.epub".to_string();
    }
    format!("{}.epub", stem)
}

/// Ensure output path parent exists; return error otherwise.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    let effective_output_dir: PathBuf = config
        .as_ref()
        .and_then(|c| c.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    const DEFAULT_DELAY_SECS: u64 = 1;
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RETRY_COUNT: u32 = 3;
    let delay_secs = args
        .delay
        .or_else(|| config.as_ref().and_then(|c| c.request_delay_secs))
        .unwrap_or(DEFAULT_DELAY_SECS);
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let retry_count = config
        .as_ref()
        .and_then(|c| c.retry_count)
        .unwrap_or(DEFAULT_RETRY_COUNT)
        .max(1);
    let retry_backoff_secs = config
        .as_ref()
        .and_then(|c| c.retry_backoff_secs.clone())
        .unwrap_or_else(|| vec![1, 2, 4]);
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));

    let mut builder = PoliteClient::builder()
        .delay_secs(delay_secs)
        .timeout_secs(timeout_secs)
        .retry_count(retry_count)
        .retry_backoff_secs(retry_backoff_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let mut client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    let mut pipeline = Pipeline::new(&mut client);

    if args.dry_run {
        let index = pipeline.fetch_index(&args.url)?;
        if index.chapters.is_empty() {
            return Err(CliRunError::Scraper(ScraperError::EmptyChapterList));
        }
        let output_path =
            resolve_output_path(args, &effective_output_dir, &index.metadata.title);
        eprintln!("Chapters: {}", index.chapters.len());
        eprintln!("Output: {}", output_path.display());
        return Ok(());
    }

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            bar.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏ "),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Fetching chapter {}/{}", n, total));
    };
    let progress: Option<&dyn Fn(u32, u32)> = if args.quiet { None } else { Some(&progress_cb) };

    let options = ScrapeOptions { progress };
    let (metadata, chapters) = pipeline.run(&args.url, &options)?;

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    if args.stdout {
        let bytes = build_epub(&metadata, &chapters)?;
        std::io::stdout()
            .write_all(&bytes)
            .map_err(|e| CliRunError::InvalidInput(format!("Failed to write EPUB to stdout: {}", e)))?;
        return Ok(());
    }

    let output_path = resolve_output_path(args, &effective_output_dir, &metadata.title);
    validate_output_path(&output_path)?;
    write_epub(&metadata, &chapters, &output_path)?;

    if !args.quiet {
        eprintln!("Wrote {}", output_path.display());
    }
    Ok(())
}

fn resolve_output_path(args: &Args, output_dir: &Path, title: &str) -> PathBuf {
    match &args.output {
        Some(p) => p.clone(),
        None => output_dir.join(epub_filename(title)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epub_filename_lowercases_and_underscores() {
        assert_eq!(
            epub_filename("Mother of Learning"),
            "mother_of_learning.epub"
        );
        assert_eq!(epub_filename("My Story!"), "my_story_.epub");
    }

    #[test]
    fn epub_filename_empty_or_symbol_only_falls_back() {
        assert_eq!(epub_filename(""), "book.epub");
        assert_eq!(epub_filename("!!!"), "book.epub");
    }

    #[test]
    fn epub_filename_keeps_digits() {
        assert_eq!(epub_filename("Book 2"), "book_2.epub");
    }

    #[test]
    fn resolve_output_path_prefers_explicit_output() {
        let args = Args::parse_from(["rrbind", "https://example.com", "-o", "custom.epub"]);
        let path = resolve_output_path(&args, Path::new("out"), "Title");
        assert_eq!(path, PathBuf::from("custom.epub"));
    }

    #[test]
    fn resolve_output_path_defaults_to_output_dir_and_title() {
        let args = Args::parse_from(["rrbind", "https://example.com"]);
        let path = resolve_output_path(&args, Path::new("out"), "My Book");
        assert_eq!(path, PathBuf::from("out/my_book.epub"));
    }

    #[test]
    fn validate_output_path_parent_exists() {
        let path = std::env::temp_dir().join("rrbind_cli_test_output.epub");
        assert!(validate_output_path(&path).is_ok());
    }

    #[test]
    fn validate_output_path_parent_missing() {
        let path = PathBuf::from("/nonexistent_dir_rrbind_xyz/output.epub");
        let result = validate_output_path(&path);
        assert!(result.is_err());
        if let Err(CliRunError::InvalidInput(msg)) = result {
            assert!(msg.contains("parent directory does not exist"));
        }
    }

    #[test]
    fn stdout_conflicts_with_output() {
        let result = Args::try_parse_from([
            "rrbind",
            "https://example.com",
            "--stdout",
            "-o",
            "x.epub",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(
            CliRunError::Scraper(ScraperError::EmptyChapterList).exit_code(),
            2
        );
        assert_eq!(CliRunError::Epub(EpubError::EmptyTitle).exit_code(), 3);
    }
}
