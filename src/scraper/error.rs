//! Shared error type for the scrape pipeline.
//!
//! Per-chapter fetch/parse problems are absorbed into placeholder content and
//! never surface here; these variants cover the index fetch and other
//! run-fatal cases.

use thiserror::Error;

/// Scrape pipeline error: URL validation, HTTP, and index parsing.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Optional context (e.g. "index page") for programmatic use.
        context: Option<String>,
    },

    #[error("Failed to read response body: {source}")]
    BodyRead { source: reqwest::Error },

    #[error("Could not parse index page: {message}")]
    ParseIndexPage { message: String },

    #[error("Could not parse chapter list on index page: {reason}")]
    ChapterListParse { reason: String },

    /// Distinct from a generic failure: the page parsed fine but held no
    /// qualifying chapter rows, so the URL is the likely culprit.
    #[error("No chapters found. Double-check the URL points at a fiction index page.")]
    EmptyChapterList,
}
