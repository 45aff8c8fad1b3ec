//! Canonical data model for a scraped fiction.
//!
//! The index parser produces [FictionMetadata] and [ChapterRef]s; the chapter
//! sanitizer produces one [ChapterContent] per ref; the EPUB writer consumes
//! both. Chapter order is the index-table row order and is never reordered.

/// Title and author extracted from the fiction index page.
///
/// Immutable once parsed. Absent elements are replaced by the
/// "Unknown Title" / "Unknown Author" sentinels, never left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FictionMetadata {
    pub title: String,
    pub author: String,
}

/// One entry from the chapter index table, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub title: String,
    /// Absolute URL of the chapter page.
    pub source_url: String,
}

/// How a chapter's content was obtained (or not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterStatus {
    /// Content container found and sanitized.
    Ok,
    /// Page fetched but the content container was missing.
    NotFound,
    /// Fetch failed after retries; the message is the last underlying cause.
    FetchError(String),
}

/// Sanitized chapter markup plus the ref it came from.
///
/// A failed fetch or missing container yields placeholder markup here rather
/// than an error: one bad chapter never blocks the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterContent {
    pub reference: ChapterRef,
    /// HTML fragment (the content container, tag included), not a full document.
    pub sanitized_markup: String,
    pub status: ChapterStatus,
}

/// Placeholder body when the chapter page has no content container.
pub const CONTENT_NOT_FOUND_PLACEHOLDER: &str = "<p>Chapter content not found.</p>";

impl ChapterContent {
    /// Successfully sanitized chapter.
    pub fn sanitized(reference: ChapterRef, markup: String) -> Self {
        Self {
            reference,
            sanitized_markup: markup,
            status: ChapterStatus::Ok,
        }
    }

    /// Page fetched but no content container found.
    pub fn not_found(reference: ChapterRef) -> Self {
        Self {
            reference,
            sanitized_markup: CONTENT_NOT_FOUND_PLACEHOLDER.to_string(),
            status: ChapterStatus::NotFound,
        }
    }

    /// Fetch failed after retries. `cause` is embedded in the placeholder body.
    pub fn fetch_error(reference: ChapterRef, cause: String) -> Self {
        let markup = format!("<p>Error fetching chapter: {}</p>", escape_text(&cause));
        Self {
            reference,
            sanitized_markup: markup,
            status: ChapterStatus::FetchError(cause),
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ref() -> ChapterRef {
        ChapterRef {
            title: "1. Good Morning Brother".to_string(),
            source_url: "https://www.royalroad.com/fiction/21220/mol/chapter/301778/1".to_string(),
        }
    }

    #[test]
    fn sanitized_keeps_markup_and_ok_status() {
        let content = ChapterContent::sanitized(sample_ref(), "<div><p>Text.</p></div>".to_string());
        assert_eq!(content.status, ChapterStatus::Ok);
        assert_eq!(content.sanitized_markup, "<div><p>Text.</p></div>");
    }

    #[test]
    fn not_found_uses_placeholder() {
        let content = ChapterContent::not_found(sample_ref());
        assert_eq!(content.status, ChapterStatus::NotFound);
        assert_eq!(content.sanitized_markup, CONTENT_NOT_FOUND_PLACEHOLDER);
    }

    #[test]
    fn fetch_error_embeds_cause_in_placeholder() {
        let content = ChapterContent::fetch_error(sample_ref(), "HTTP 503".to_string());
        assert_eq!(content.status, ChapterStatus::FetchError("HTTP 503".to_string()));
        assert!(content.sanitized_markup.contains("Error fetching chapter"));
        assert!(content.sanitized_markup.contains("HTTP 503"));
    }

    #[test]
    fn fetch_error_escapes_cause() {
        let content = ChapterContent::fetch_error(sample_ref(), "bad <tag> & more".to_string());
        assert!(content.sanitized_markup.contains("bad &lt;tag&gt; &amp; more"));
        assert!(!content.sanitized_markup.contains("<tag>"));
    }
}
