//! Book data model
//!
//! A [`Book`] is the immutable input to the pipeline: ordered chapters of
//! plain text plus the metadata and cover art needed for container tagging.
//! It is produced by the extractor and never mutated afterwards.

pub mod extractor;

pub use extractor::extract_book;

use serde::{Deserialize, Serialize};

/// Book-level metadata used for container tagging
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    /// ISO 639-1 language code
    pub language: String,
    pub date: Option<String>,
    pub description: Option<String>,
}

/// Cover image bytes with their MIME type
#[derive(Debug, Clone)]
pub struct Cover {
    pub data: Vec<u8>,
    pub mime: String,
}

impl Cover {
    /// File extension matching the MIME type, for handing to the muxer
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }
}

/// A single chapter of plain text
#[derive(Debug, Clone)]
pub struct Chapter {
    /// 0-based position; defines the final ordering
    pub index: usize,
    pub title: String,
    /// Cleaned plain-text body
    pub body: String,
}

impl Chapter {
    pub fn new(index: usize, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            body: body.into(),
        }
    }

    /// Whether the chapter carries any synthesizable text
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

/// An extracted book: ordered chapters plus metadata
#[derive(Debug, Clone)]
pub struct Book {
    pub metadata: BookMetadata,
    pub chapters: Vec<Chapter>,
    pub cover: Option<Cover>,
}

impl Book {
    pub fn new(metadata: BookMetadata, chapters: Vec<Chapter>) -> Self {
        Self {
            metadata,
            chapters,
            cover: None,
        }
    }

    pub fn with_cover(mut self, cover: Cover) -> Self {
        self.cover = Some(cover);
        self
    }

    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(Chapter::word_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_emptiness() {
        assert!(Chapter::new(0, "Blank", "  \n\t ").is_empty());
        assert!(!Chapter::new(0, "Text", "Hello.").is_empty());
    }

    #[test]
    fn test_total_words() {
        let book = Book::new(
            BookMetadata::default(),
            vec![
                Chapter::new(0, "One", "three little words"),
                Chapter::new(1, "Two", "and two more"),
            ],
        );
        assert_eq!(book.total_words(), 6);
    }

    #[test]
    fn test_cover_extension() {
        let cover = Cover {
            data: vec![],
            mime: "image/png".into(),
        };
        assert_eq!(cover.extension(), "png");
        let cover = Cover {
            data: vec![],
            mime: "image/jpeg".into(),
        };
        assert_eq!(cover.extension(), "jpg");
    }
}
