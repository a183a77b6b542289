//! EPUB extraction
//!
//! Walks the EPUB spine in reading order, converts each document to plain
//! text, cleans it for synthesis and sniffs a chapter title from heading
//! tags. Container parsing itself is delegated to the `epub` crate; this
//! module only shapes its output into the [`Book`] model.

use std::path::Path;

use epub::doc::EpubDoc;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::book::{Book, BookMetadata, Chapter, Cover};
use crate::core::error::{PipelineError, Result};
use crate::text::TextCleaner;

/// Extract a [`Book`] from an EPUB file, cleaning chapter text for synthesis
pub fn extract_book(path: &Path, cleaner: &TextCleaner) -> Result<Book> {
    let mut doc = EpubDoc::new(path).map_err(|e| PipelineError::Extract {
        message: format!("failed to open EPUB: {}", e),
        path: Some(path.to_path_buf()),
    })?;

    let metadata = BookMetadata {
        title: mdata_value(&doc, "title").unwrap_or_else(|| "Unknown Title".to_string()),
        author: mdata_value(&doc, "creator").unwrap_or_else(|| "Unknown Author".to_string()),
        language: mdata_value(&doc, "language").unwrap_or_else(|| "en".to_string()),
        date: mdata_value(&doc, "date"),
        description: mdata_value(&doc, "description"),
    };

    let title_regex = Regex::new(r"(?is)<h[1-3][^>]*>(.*?)</h[1-3]>").expect("static regex");
    let tag_regex = Regex::new(r"<[^>]+>").expect("static regex");

    let mut chapters = Vec::new();
    let page_count = doc.get_num_pages();

    for page in 0..page_count {
        if !doc.set_current_page(page) {
            warn!(page, "spine item could not be opened, skipping");
            continue;
        }
        let Some((html, _mime)) = doc.get_current_str() else {
            warn!(page, "spine item has no readable content, skipping");
            continue;
        };

        let body = chapter_body(&html, cleaner);

        if body.trim().is_empty() {
            debug!(page, "spine item is empty after cleanup, skipping");
            continue;
        }

        let index = chapters.len();
        let title = sniff_title(&html, &title_regex, &tag_regex)
            .unwrap_or_else(|| format!("Chapter {}", index + 1));

        debug!(index, title = %title, chars = body.len(), "extracted chapter");
        chapters.push(Chapter { index, title, body });
    }

    if chapters.is_empty() {
        return Err(PipelineError::Extract {
            message: "no chapters with text content found".to_string(),
            path: Some(path.to_path_buf()),
        });
    }

    let mut book = Book::new(metadata, chapters);
    if let Some((data, mime)) = doc.get_cover() {
        book.cover = Some(Cover { data, mime });
    }

    info!(
        title = %book.metadata.title,
        chapters = book.chapters.len(),
        words = book.total_words(),
        "parsed EPUB"
    );
    Ok(book)
}

/// Render a spine document to cleaned plain text
fn chapter_body(html: &str, cleaner: &TextCleaner) -> String {
    let plain = html2text::from_read(html.as_bytes(), 80);
    cleaner.clean(&plain)
}

/// First value of an OPF metadata entry, if present
fn mdata_value(doc: &EpubDoc<std::io::BufReader<std::fs::File>>, name: &str) -> Option<String> {
    doc.mdata(name).map(|item| item.value.clone())
}

/// Pull a chapter title out of the first h1-h3 heading, if any
fn sniff_title(html: &str, title_regex: &Regex, tag_regex: &Regex) -> Option<String> {
    let captures = title_regex.captures(html)?;
    let inner = captures.get(1)?.as_str();
    let text = tag_regex.replace_all(inner, "");
    let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { None } else { Some(title) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regexes() -> (Regex, Regex) {
        (
            Regex::new(r"(?is)<h[1-3][^>]*>(.*?)</h[1-3]>").unwrap(),
            Regex::new(r"<[^>]+>").unwrap(),
        )
    }

    #[test]
    fn test_sniff_title_from_heading() {
        let (t, g) = regexes();
        let html = "<body><h1 class=\"c\">The  <em>Opening</em></h1><p>x</p></body>";
        assert_eq!(sniff_title(html, &t, &g), Some("The Opening".to_string()));
    }

    #[test]
    fn test_sniff_title_missing() {
        let (t, g) = regexes();
        assert_eq!(sniff_title("<p>no headings here</p>", &t, &g), None);
    }

    #[test]
    fn test_sniff_title_empty_heading() {
        let (t, g) = regexes();
        assert_eq!(sniff_title("<h2>   </h2>", &t, &g), None);
    }

    #[test]
    fn test_chapter_body_renders_and_cleans() {
        let cleaner = TextCleaner::default();
        let html = "<html><body><p>Dr. Who   said:</p><p>hello   there.</p></body></html>";
        let body = chapter_body(html, &cleaner);
        assert!(body.contains("Doctor Who"));
        assert!(body.contains("hello there."));
        assert!(!body.contains('\n'));
    }

    #[test]
    fn test_chapter_body_empty_document() {
        let cleaner = TextCleaner::default();
        assert!(chapter_body("<html><body></body></html>", &cleaner).trim().is_empty());
    }
}
