//! Chapter page sanitization.
//!
//! Locates the narrative content container and strips non-narrative nodes:
//! advertisement paragraphs, author notes, UI action controls, and scripts.
//! The result is the serialized container (tag included) with whitespace runs
//! collapsed. Sanitization is idempotent: running it on its own output
//! changes nothing.

use crate::model::{ChapterContent, ChapterRef};
use crate::scraper::error::ScraperError;
use crate::scraper::parse_selector;
use scraper::{ElementRef, Html};

/// Class marker of the narrative content container on a chapter page.
const CONTENT_CONTAINER: &str = "div.chapter-content";

/// Paragraphs whose trimmed text equals this are advertisements.
const AD_MARKER: &str = "Advertisement";
/// Paragraphs containing this substring are stolen-content notices.
const REMOVED_MARKER: &str = "[Remove]";
/// Paragraphs starting with this prefix are author notes.
const AUTHOR_NOTE_PREFIX: &str = "Author's Comment:";

/// Sanitize a chapter page.
///
/// Returns `Ok(None)` when the content container is missing; that is ordinary
/// control flow, not an error. Otherwise returns the cleaned container as an
/// HTML fragment.
pub fn sanitize_chapter(html: &str) -> Result<Option<String>, ScraperError> {
    let container_sel = parse_selector(CONTENT_CONTAINER)?;
    let p_sel = parse_selector("p")?;
    let div_sel = parse_selector("div")?;
    let script_sel = parse_selector("script")?;

    let mut doc = Html::parse_document(html);

    let (container_id, doomed) = {
        let container = match doc.select(&container_sel).next() {
            Some(c) => c,
            None => return Ok(None),
        };
        let mut doomed = Vec::new();
        for p in container.select(&p_sel) {
            let text: String = p.text().collect();
            if removable_paragraph(&text) {
                doomed.push(p.id());
            }
        }
        for div in container.select(&div_sel) {
            if div.value().classes().any(|c| c.contains("Actions")) {
                doomed.push(div.id());
            }
        }
        for script in container.select(&script_sel) {
            doomed.push(script.id());
        }
        (container.id(), doomed)
    };

    for id in doomed {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    let fragment = doc
        .tree
        .get(container_id)
        .and_then(ElementRef::wrap)
        .map(|el| el.html())
        .unwrap_or_default();
    Ok(Some(collapse_whitespace(&fragment)))
}

/// Build a [ChapterContent] from a fetched chapter page body.
///
/// Missing container (or a parse problem) becomes a placeholder with
/// `NotFound` status rather than an error.
pub fn chapter_content(reference: &ChapterRef, html: &str) -> ChapterContent {
    match sanitize_chapter(html) {
        Ok(Some(markup)) => ChapterContent::sanitized(reference.clone(), markup),
        Ok(None) => ChapterContent::not_found(reference.clone()),
        Err(e) => {
            eprintln!(
                "Could not sanitize chapter at {}: {}. Using placeholder.",
                reference.source_url, e
            );
            ChapterContent::not_found(reference.clone())
        }
    }
}

/// Text-exact removal rules. Partial overlap with narrative text must not
/// trigger removal unless it matches one of these.
fn removable_paragraph(text: &str) -> bool {
    let t = text.trim();
    t == AD_MARKER || t.contains(REMOVED_MARKER) || t.starts_with(AUTHOR_NOTE_PREFIX)
}

/// Collapse any run of whitespace (including non-breaking spaces and
/// newlines) to a single space. Non-whitespace content is untouched.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_whitespace = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
            }
            in_whitespace = true;
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}
