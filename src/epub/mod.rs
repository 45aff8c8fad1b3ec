//! EPUB writer. Consumes [FictionMetadata] and sanitized chapters and writes
//! one EPUB 3 package (mimetype, container, OPF, nav, NCX, stylesheet, cover,
//! chapters).
//!
//! Ordering is guarded three ways against reader-software inconsistency:
//! chapter file names sort lexically in reading order (`chap_001.xhtml`…),
//! the navigation documents list cover then chapters in discovery order, and
//! the spine is exactly `[nav, cover, chap_1..chap_n]`. Output is
//! deterministic: the same inputs produce byte-identical packages whether
//! built in memory or written to a file.

use crate::model::{ChapterContent, FictionMetadata};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

/// Shared stylesheet applied to every chapter page.
const STYLESHEET: &str = "p { margin-bottom: 1em; line-height: 1.5; }\n";

/// Substituted when a chapter's markup is empty at assembly time.
const EMPTY_BODY_PLACEHOLDER: &str = "<p>Error encoding chapter content.</p>";

/// Errors from the EPUB writer. Final package serialization failures are the
/// only pipeline-fatal assembly errors.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book author is empty.")]
    EmptyAuthor,

    #[error("Cannot write EPUB: book has no chapters.")]
    NoChapters,

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Build the EPUB package in memory and return its bytes.
pub fn build_epub(
    metadata: &FictionMetadata,
    chapters: &[ChapterContent],
) -> Result<Vec<u8>, EpubError> {
    validate(metadata, chapters)?;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    write_package(metadata, chapters, &mut zip)?;
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Write the EPUB package to a file. Byte-identical to [build_epub] output
/// for the same inputs.
pub fn write_epub(
    metadata: &FictionMetadata,
    chapters: &[ChapterContent],
    path: &Path,
) -> Result<(), EpubError> {
    validate(metadata, chapters)?;
    let file = std::fs::File::create(path).map_err(|e| EpubError::CreateFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);
    write_package(metadata, chapters, &mut zip)?;
    zip.finish()?;
    Ok(())
}

/// Stable package identifier derived from the title: lower-cased,
/// non-alphanumeric characters stripped. Same title, same identifier.
pub fn package_identifier(title: &str) -> String {
    let stripped: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("royalroad_{}", stripped)
}

/// Chapter file name for the 1-based index. Zero-padded to at least three
/// digits so lexical sort order matches reading order.
fn chapter_file_name(index: usize) -> String {
    format!("chap_{:03}.xhtml", index)
}

fn validate(metadata: &FictionMetadata, chapters: &[ChapterContent]) -> Result<(), EpubError> {
    if metadata.title.trim().is_empty() {
        return Err(EpubError::EmptyTitle);
    }
    if metadata.author.trim().is_empty() {
        return Err(EpubError::EmptyAuthor);
    }
    if chapters.is_empty() {
        return Err(EpubError::NoChapters);
    }
    Ok(())
}

fn write_package(
    metadata: &FictionMetadata,
    chapters: &[ChapterContent],
    zip: &mut ZipWriter<impl Write + Seek>,
) -> Result<(), EpubError> {
    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    // Mimetype first, uncompressed (required by the EPUB spec).
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    write_opf(metadata, chapters, zip, options_deflate)?;
    write_nav_xhtml(chapters, zip, options_deflate)?;
    write_ncx(metadata, chapters, zip, options_deflate)?;

    zip.start_file(format!("{}style/style.css", OEBPS_PREFIX), options_deflate)?;
    zip.write_all(STYLESHEET.as_bytes())?;

    write_cover_xhtml(metadata, zip, options_deflate)?;
    write_chapters(chapters, zip, options_deflate)?;
    Ok(())
}

fn write_opf(
    metadata: &FictionMetadata,
    chapters: &[ChapterContent],
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let id = xml_escape(&package_identifier(&metadata.title));
    let title = xml_escape(&metadata.title);
    let creator = xml_escape(&metadata.author);

    let mut manifest = String::from(
        r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
  <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  <item id="style" href="style/style.css" media-type="text/css"/>
  <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
"#,
    );
    for i in 1..=chapters.len() {
        manifest.push_str(&format!(
            r#"  <item id="chap-{}" href="{}" media-type="application/xhtml+xml"/>
"#,
            i,
            chapter_file_name(i)
        ));
    }

    // Spine is the canonical reading order: nav, cover, then every chapter
    // in discovery order.
    let mut spine = String::from(
        r#"  <itemref idref="nav"/>
  <itemref idref="cover"/>"#,
    );
    for i in 1..=chapters.len() {
        spine.push_str(&format!("\n  <itemref idref=\"chap-{}\"/>", i));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0"
  xmlns:dc="http://purl.org/dc/elements/1.1/">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{creator}</dc:creator>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}
  </spine>
  <guide>
  <reference type="cover" href="cover.xhtml" title="Cover"/>
  </guide>
</package>
"#,
        id = id,
        title = title,
        creator = creator,
        manifest = manifest,
        spine = spine
    );

    zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
    zip.write_all(opf.as_bytes())?;
    Ok(())
}

fn write_nav_xhtml(
    chapters: &[ChapterContent],
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_links = String::from(
        r#"    <li><a href="cover.xhtml">Cover</a></li>
"#,
    );
    for (i, ch) in chapters.iter().enumerate() {
        nav_links.push_str(&format!(
            r#"    <li><a href="{}">{}</a></li>
"#,
            chapter_file_name(i + 1),
            html_escape_attr(&ch.reference.title)
        ));
    }
    let nav = format!(
        r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
  <meta charset="UTF-8"/>
  <title>Table of Contents</title>
</head>
<body>
  <nav epub:type="toc">
    <h1>Contents</h1>
    <ol>
{}
    </ol>
  </nav>
</body>
</html>
"#,
        nav_links
    );
    zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(nav.as_bytes())?;
    Ok(())
}

fn write_ncx(
    metadata: &FictionMetadata,
    chapters: &[ChapterContent],
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_points = String::from(
        r#"    <navPoint id="navpoint-cover" playOrder="1">
      <navLabel><text>Cover</text></navLabel>
      <content src="cover.xhtml"/>
    </navPoint>
"#,
    );
    for (i, ch) in chapters.iter().enumerate() {
        nav_points.push_str(&format!(
            r#"    <navPoint id="navpoint-{}" playOrder="{}">
      <navLabel><text>{}</text></navLabel>
      <content src="{}"/>
    </navPoint>
"#,
            i + 1,
            i + 2,
            xml_escape(&ch.reference.title),
            chapter_file_name(i + 1)
        ));
    }
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}
  </navMap>
</ncx>
"#,
        xml_escape(&package_identifier(&metadata.title)),
        xml_escape(&metadata.title),
        nav_points
    );
    zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
    zip.write_all(ncx.as_bytes())?;
    Ok(())
}

fn write_cover_xhtml(
    metadata: &FictionMetadata,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let title = html_escape_attr(&metadata.title);
    let author = html_escape_attr(&metadata.author);
    let cover = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
  <h1 style="text-align: center; font-size: 2em; margin-top: 50px;">{title}</h1>
  <p style="text-align: center; font-size: 1.2em;">By {author}</p>
</body>
</html>
"#,
        title = title,
        author = author
    );
    zip.start_file(format!("{}cover.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(cover.as_bytes())?;
    Ok(())
}

fn write_chapters(
    chapters: &[ChapterContent],
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    for (i, ch) in chapters.iter().enumerate() {
        let title = html_escape_attr(&ch.reference.title);
        let body = if ch.sanitized_markup.trim().is_empty() {
            EMPTY_BODY_PLACEHOLDER
        } else {
            ch.sanitized_markup.as_str()
        };
        let html = format!(
            r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="style/style.css"/>
</head>
<body>
  <h1>{title}</h1>
{body}
</body>
</html>
"#,
            title = title,
            body = body
        );
        zip.start_file(
            format!("{}{}", OEBPS_PREFIX, chapter_file_name(i + 1)),
            options,
        )?;
        zip.write_all(html.as_bytes())?;
    }
    Ok(())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn html_escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
