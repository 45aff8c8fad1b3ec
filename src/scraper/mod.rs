//! Scrape pipeline: HTTP client, index parsing, chapter sanitization, and the
//! orchestrator that sequences them.
//!
//! One run is one pass through: fetch index → fail fast if no chapters →
//! fetch and sanitize each chapter strictly in discovery order (the client
//! enforces a politeness pause between requests) → hand the results to the
//! EPUB writer. No state survives a run.

mod client;
mod error;

pub mod chapter;
pub mod index;

pub use client::{PoliteClient, PoliteClientBuilder};
pub use error::ScraperError;

use crate::model::{ChapterContent, ChapterRef, FictionMetadata};
use index::IndexPage;
use reqwest::Url;
use scraper::Selector;

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::ParseIndexPage {
        message: format!("invalid selector {:?}: {}", sel, e),
    })
}

/// Options for one pipeline run.
#[derive(Default)]
pub struct ScrapeOptions<'a> {
    /// Invoked after each chapter as (done, total). None disables reporting.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
}

/// Require a fiction index URL (no /chapter/ in the path).
fn ensure_index_url(url: &str) -> Result<(), ScraperError> {
    let parsed = Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
        input: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.path().contains("/chapter/") {
        return Err(ScraperError::InvalidUrl {
            input: url.to_string(),
            reason: "expected a fiction index URL, not a chapter URL; use the story page, e.g. https://www.royalroad.com/fiction/21220/mother-of-learning".to_string(),
        });
    }
    Ok(())
}

/// Check response status and read the body as text.
fn check_response(
    response: reqwest::blocking::Response,
    url: &str,
    context: Option<&str>,
) -> Result<String, ScraperError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ScraperError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
            context: context.map(String::from),
        });
    }
    response
        .text()
        .map_err(|e| ScraperError::BodyRead { source: e })
}

/// Pipeline orchestrator. Borrows the shared polite client for one run.
///
/// States flow Idle → FetchingIndex → FetchingChapters → done; the two
/// terminal failures are an index-fetch error (any [ScraperError] except
/// [ScraperError::EmptyChapterList]) and the distinct no-chapters case.
pub struct Pipeline<'a> {
    client: &'a mut PoliteClient,
}

impl<'a> Pipeline<'a> {
    pub fn new(client: &'a mut PoliteClient) -> Self {
        Self { client }
    }

    /// Fetch and parse the fiction index page.
    ///
    /// Network and parse failures here are run-fatal; the caller gets the
    /// underlying cause. An empty chapter list is returned as-is so the
    /// caller can distinguish it (see [Pipeline::run]).
    pub fn fetch_index(&mut self, url: &str) -> Result<IndexPage, ScraperError> {
        ensure_index_url(url)?;
        let response = self
            .client
            .get_with_retry(url)
            .map_err(|e| ScraperError::Network {
                url: url.to_string(),
                source: e,
            })?;
        let html = check_response(response, url, Some("index page"))?;
        index::parse_index(&html)
    }

    /// Fetch one chapter page and sanitize it.
    ///
    /// Never fails: network errors, bad statuses, unreadable bodies, and
    /// missing content containers all degrade to placeholder content so the
    /// rest of the run can continue.
    pub fn fetch_and_sanitize_chapter(&mut self, reference: &ChapterRef) -> ChapterContent {
        let response = match self.client.get_with_retry(&reference.source_url) {
            Ok(r) => r,
            Err(e) => {
                eprintln!(
                    "Chapter {:?}: network error at {}: {}. Using placeholder.",
                    reference.title, reference.source_url, e
                );
                return ChapterContent::fetch_error(reference.clone(), format!("network error: {}", e));
            }
        };
        let status = response.status();
        if !status.is_success() {
            eprintln!(
                "Chapter {:?}: HTTP {} at {}. Using placeholder.",
                reference.title,
                status.as_u16(),
                reference.source_url
            );
            return ChapterContent::fetch_error(
                reference.clone(),
                format!("HTTP {}", status.as_u16()),
            );
        }
        let html = match response.text() {
            Ok(t) => t,
            Err(e) => {
                eprintln!(
                    "Chapter {:?}: failed to read body: {}. Using placeholder.",
                    reference.title, e
                );
                return ChapterContent::fetch_error(
                    reference.clone(),
                    format!("failed to read body: {}", e),
                );
            }
        };
        chapter::chapter_content(reference, &html)
    }

    /// Run the fetch half of the pipeline: index, then every chapter
    /// strictly sequentially in discovery order.
    ///
    /// Fails fast with [ScraperError::EmptyChapterList] when the index yields
    /// no chapters. Per-chapter failures become placeholders; the returned
    /// list always has one entry per discovered chapter, in order.
    pub fn run(
        &mut self,
        url: &str,
        options: &ScrapeOptions<'_>,
    ) -> Result<(FictionMetadata, Vec<ChapterContent>), ScraperError> {
        let index = self.fetch_index(url)?;
        if index.chapters.is_empty() {
            return Err(ScraperError::EmptyChapterList);
        }
        let total = index.chapters.len() as u32;
        let mut contents = Vec::with_capacity(index.chapters.len());
        for (i, reference) in index.chapters.iter().enumerate() {
            contents.push(self.fetch_and_sanitize_chapter(reference));
            if let Some(progress) = options.progress {
                progress(i as u32 + 1, total);
            }
        }
        Ok((index.metadata, contents))
    }
}
