//! rrbind: CLI scraper for Royal Road fiction, binding chapters into a single EPUB.

pub mod cli;
pub mod config;
pub mod epub;
pub mod model;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use epub::{build_epub, write_epub, EpubError};
pub use model::{ChapterContent, ChapterRef, ChapterStatus, FictionMetadata};
pub use scraper::{
    Pipeline, PoliteClient, PoliteClientBuilder, ScrapeOptions, ScraperError,
};
