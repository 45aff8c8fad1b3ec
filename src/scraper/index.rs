//! Fiction index page parsing: title, author, and the ordered chapter list.
//!
//! Extraction rules are deliberately tied to the host's current markup (first
//! heading, `/profile/<digits>` author link, first table as the chapter
//! index). The chapter-row heuristic is fragile by nature; it is pinned down
//! by the tests here rather than hidden.

use crate::model::{ChapterRef, FictionMetadata};
use crate::scraper::error::ScraperError;
use crate::scraper::parse_selector;
use reqwest::Url;
use scraper::{ElementRef, Html};

/// Base origin for resolving relative chapter hrefs.
pub const ROYALROAD_BASE: &str = "https://www.royalroad.com";

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Parsed fiction index page: metadata plus chapters in source-table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPage {
    pub metadata: FictionMetadata,
    /// Reading order. Row order in the source table is canonical and preserved.
    pub chapters: Vec<ChapterRef>,
}

/// Parse a fiction index page.
///
/// Title is the first `<h1>`, author the first `/profile/<digits>` link; each
/// falls back to a sentinel when absent. Chapters come from the first
/// `<table>` (header row skipped); rows without a qualifying chapter link are
/// silently skipped. An empty chapter list is returned as-is; the caller
/// decides whether that is fatal.
pub fn parse_index(html: &str) -> Result<IndexPage, ScraperError> {
    let doc = Html::parse_document(html);

    let h1_sel = parse_selector("h1")?;
    let title = doc
        .select(&h1_sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let a_sel = parse_selector("a")?;
    let author = doc
        .select(&a_sel)
        .find(|a| a.value().attr("href").is_some_and(is_profile_href))
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let chapters = parse_chapter_rows(&doc)?;

    Ok(IndexPage {
        metadata: FictionMetadata { title, author },
        chapters,
    })
}

/// True for hrefs of the form `…/profile/<digits>…` (author profile links).
fn is_profile_href(href: &str) -> bool {
    match href.find("/profile/") {
        Some(i) => href[i + "/profile/".len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Extract chapter refs from the first table on the page.
///
/// A row qualifies iff it has at least two cells and the first link in its
/// first cell has an href containing `/chapter/`. Relative hrefs are resolved
/// against [ROYALROAD_BASE].
fn parse_chapter_rows(doc: &Html) -> Result<Vec<ChapterRef>, ScraperError> {
    let table_sel = parse_selector("table")?;
    let tr_sel = parse_selector("tr")?;
    let td_sel = parse_selector("td")?;
    let a_sel = parse_selector("a")?;

    let table = match doc.select(&table_sel).next() {
        Some(t) => t,
        None => return Ok(Vec::new()),
    };

    let base = Url::parse(ROYALROAD_BASE).map_err(|e| ScraperError::ChapterListParse {
        reason: e.to_string(),
    })?;

    let mut chapters = Vec::new();
    // First row is the table header.
    for row in table.select(&tr_sel).skip(1) {
        let cells: Vec<ElementRef> = row.select(&td_sel).collect();
        if cells.len() < 2 {
            continue;
        }
        let link = match cells[0].select(&a_sel).next() {
            Some(a) => a,
            None => continue,
        };
        let href = match link.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if !href.contains("/chapter/") {
            continue;
        }
        let title = link.text().collect::<String>().trim().to_string();
        let source_url = resolve_href(&base, href)?;
        chapters.push(ChapterRef { title, source_url });
    }
    Ok(chapters)
}

fn resolve_href(base: &Url, href: &str) -> Result<String, ScraperError> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Ok(href.to_string());
    }
    base.join(href)
        .map(|u| u.to_string())
        .map_err(|e| ScraperError::ChapterListParse {
            reason: format!("cannot resolve chapter href {:?}: {}", href, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"<!DOCTYPE html><html><head><title>Mother of Learning | Royal Road</title></head><body>
<h1>Mother of Learning</h1>
<h4><a href="/profile/93757">nobody103</a></h4>
<table id="chapters">
  <tr><th>Chapter</th><th>Release Date</th></tr>
  <tr><td><a href="/fiction/21220/mol/chapter/301778/1-good-morning-brother">1. Good Morning Brother</a></td><td>2015</td></tr>
  <tr><td><a href="/fiction/21220/mol/chapter/301779/2-life-s-little-problems">2. Life's Little Problems</a></td><td>2015</td></tr>
  <tr><td><a href="/fiction/21220/mol/chapter/301780/3-the-bitter-truth">3. The Bitter Truth</a></td><td>2015</td></tr>
</table>
</body></html>"#;

    #[test]
    fn parses_title_author_and_chapters_in_order() -> Result<(), ScraperError> {
        let index = parse_index(INDEX_HTML)?;
        assert_eq!(index.metadata.title, "Mother of Learning");
        assert_eq!(index.metadata.author, "nobody103");
        assert_eq!(index.chapters.len(), 3);
        assert_eq!(index.chapters[0].title, "1. Good Morning Brother");
        assert_eq!(index.chapters[1].title, "2. Life's Little Problems");
        assert_eq!(index.chapters[2].title, "3. The Bitter Truth");
        Ok(())
    }

    #[test]
    fn relative_hrefs_resolved_against_base() -> Result<(), ScraperError> {
        let index = parse_index(INDEX_HTML)?;
        assert_eq!(
            index.chapters[0].source_url,
            "https://www.royalroad.com/fiction/21220/mol/chapter/301778/1-good-morning-brother"
        );
        Ok(())
    }

    #[test]
    fn absolute_hrefs_kept_as_is() -> Result<(), ScraperError> {
        let html = r#"<html><body><h1>T</h1><table>
<tr><th>h</th></tr>
<tr><td><a href="https://www.royalroad.com/fiction/1/s/chapter/9/ch">Ch</a></td><td>d</td></tr>
</table></body></html>"#;
        let index = parse_index(html)?;
        assert_eq!(
            index.chapters[0].source_url,
            "https://www.royalroad.com/fiction/1/s/chapter/9/ch"
        );
        Ok(())
    }

    #[test]
    fn malformed_rows_are_skipped_and_order_preserved() -> Result<(), ScraperError> {
        // 3 valid rows plus one row whose link is not a chapter link.
        let html = r#"<html><body><h1>T</h1><a href="/profile/5">A</a><table>
<tr><th>Chapter</th><th>Date</th></tr>
<tr><td><a href="/fiction/1/s/chapter/10/one">One</a></td><td>d</td></tr>
<tr><td><a href="/fiction/1/s/about">Not a chapter</a></td><td>d</td></tr>
<tr><td><a href="/fiction/1/s/chapter/11/two">Two</a></td><td>d</td></tr>
<tr><td><a href="/fiction/1/s/chapter/12/three">Three</a></td><td>d</td></tr>
</table></body></html>"#;
        let index = parse_index(html)?;
        let titles: Vec<&str> = index.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
        Ok(())
    }

    #[test]
    fn rows_with_fewer_than_two_cells_are_skipped() -> Result<(), ScraperError> {
        let html = r#"<html><body><h1>T</h1><table>
<tr><th>Chapter</th></tr>
<tr><td><a href="/fiction/1/s/chapter/10/solo">Solo cell</a></td></tr>
<tr><td><a href="/fiction/1/s/chapter/11/ok">Ok</a></td><td>d</td></tr>
</table></body></html>"#;
        let index = parse_index(html)?;
        assert_eq!(index.chapters.len(), 1);
        assert_eq!(index.chapters[0].title, "Ok");
        Ok(())
    }

    #[test]
    fn header_row_is_skipped() -> Result<(), ScraperError> {
        // Header row contains a chapter-like link; it must still be skipped.
        let html = r#"<html><body><h1>T</h1><table>
<tr><td><a href="/fiction/1/s/chapter/1/header">Header</a></td><td>d</td></tr>
<tr><td><a href="/fiction/1/s/chapter/2/body">Body</a></td><td>d</td></tr>
</table></body></html>"#;
        let index = parse_index(html)?;
        assert_eq!(index.chapters.len(), 1);
        assert_eq!(index.chapters[0].title, "Body");
        Ok(())
    }

    #[test]
    fn missing_title_and_author_use_sentinels() -> Result<(), ScraperError> {
        let html = "<html><body><p>Nothing here.</p></body></html>";
        let index = parse_index(html)?;
        assert_eq!(index.metadata.title, "Unknown Title");
        assert_eq!(index.metadata.author, "Unknown Author");
        assert!(index.chapters.is_empty());
        Ok(())
    }

    #[test]
    fn author_link_requires_digits_after_profile() -> Result<(), ScraperError> {
        let html = r#"<html><body><h1>T</h1>
<a href="/profile/settings">Settings</a>
<a href="/profile/42">RealAuthor</a>
</body></html>"#;
        let index = parse_index(html)?;
        assert_eq!(index.metadata.author, "RealAuthor");
        Ok(())
    }

    #[test]
    fn is_profile_href_matches() {
        assert!(is_profile_href("/profile/12345"));
        assert!(is_profile_href("https://www.royalroad.com/profile/9"));
        assert!(!is_profile_href("/profile/"));
        assert!(!is_profile_href("/profile/me"));
        assert!(!is_profile_href("/fiction/1"));
    }

    #[test]
    fn no_table_means_no_chapters() -> Result<(), ScraperError> {
        let html = "<html><body><h1>Title Only</h1></body></html>";
        let index = parse_index(html)?;
        assert!(index.chapters.is_empty());
        Ok(())
    }
}
