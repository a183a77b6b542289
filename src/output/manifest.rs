//! Chapter manifest: per-chapter start offsets and durations in the final
//! stream, plus the FFMETADATA rendering consumed by the muxer.

use serde::Serialize;

use crate::book::BookMetadata;

/// One chapter's position in the assembled stream.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChapterEntry {
    pub index: usize,
    pub title: String,
    /// Offset of the chapter start from the beginning of the stream
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// The complete chapter map of an assembled audiobook.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub title: String,
    pub author: String,
    pub total_duration_secs: f64,
    pub chapters: Vec<ChapterEntry>,
}

impl Manifest {
    /// Render in ffmpeg's FFMETADATA1 format, with chapter marks on a
    /// millisecond timebase.
    pub fn to_ffmetadata(&self) -> String {
        let mut out = String::from(";FFMETADATA1\n");
        out.push_str(&format!("title={}\n", escape(&self.title)));
        out.push_str(&format!("artist={}\n", escape(&self.author)));

        for entry in &self.chapters {
            let start_ms = (entry.start_secs * 1000.0).round() as u64;
            let end_ms = ((entry.start_secs + entry.duration_secs) * 1000.0).round() as u64;
            out.push_str("\n[CHAPTER]\n");
            out.push_str("TIMEBASE=1/1000\n");
            out.push_str(&format!("START={start_ms}\n"));
            out.push_str(&format!("END={end_ms}\n"));
            out.push_str(&format!("title={}\n", escape(&entry.title)));
        }
        out
    }
}

// FFMETADATA treats '=', ';', '#', '\' and newline as syntax
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Accumulates chapter durations into absolute stream offsets, accounting
/// for the pause inserted between consecutive chapters.
pub struct ManifestBuilder {
    pause_secs: f64,
    cursor: f64,
    entries: Vec<ChapterEntry>,
}

impl ManifestBuilder {
    pub fn new(pause_secs: f64) -> Self {
        Self {
            pause_secs,
            cursor: 0.0,
            entries: Vec::new(),
        }
    }

    /// Append the next chapter. Chapters must be added in stream order;
    /// zero-duration chapters are recorded like any other so the chapter
    /// list mirrors the book's structure.
    pub fn push_chapter(&mut self, index: usize, title: &str, duration_secs: f64) {
        if !self.entries.is_empty() {
            self.cursor += self.pause_secs;
        }
        self.entries.push(ChapterEntry {
            index,
            title: title.to_string(),
            start_secs: self.cursor,
            duration_secs,
        });
        self.cursor += duration_secs;
    }

    pub fn build(self, metadata: &BookMetadata) -> Manifest {
        Manifest {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
            total_duration_secs: self.cursor,
            chapters: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> BookMetadata {
        BookMetadata {
            title: "A Book".to_string(),
            author: "Someone".to_string(),
            language: "en".to_string(),
            date: None,
            description: None,
        }
    }

    #[test]
    fn test_offsets_account_for_pauses() {
        let mut builder = ManifestBuilder::new(2.0);
        builder.push_chapter(0, "One", 10.0);
        builder.push_chapter(1, "Two", 20.0);
        builder.push_chapter(2, "Three", 5.0);
        let manifest = builder.build(&meta());

        assert_eq!(manifest.chapters[0].start_secs, 0.0);
        assert_eq!(manifest.chapters[1].start_secs, 12.0);
        assert_eq!(manifest.chapters[2].start_secs, 34.0);
        // 35s of audio plus two 2s pauses
        assert_eq!(manifest.total_duration_secs, 39.0);
    }

    #[test]
    fn test_zero_duration_chapter_still_listed() {
        let mut builder = ManifestBuilder::new(2.0);
        builder.push_chapter(0, "One", 10.0);
        builder.push_chapter(1, "Blank", 0.0);
        builder.push_chapter(2, "Three", 5.0);
        let manifest = builder.build(&meta());

        assert_eq!(manifest.chapters.len(), 3);
        assert_eq!(manifest.chapters[1].start_secs, 12.0);
        assert_eq!(manifest.chapters[1].duration_secs, 0.0);
        assert_eq!(manifest.chapters[2].start_secs, 14.0);
    }

    #[test]
    fn test_single_chapter_no_pause() {
        let mut builder = ManifestBuilder::new(2.0);
        builder.push_chapter(0, "Only", 7.5);
        let manifest = builder.build(&meta());
        assert_eq!(manifest.total_duration_secs, 7.5);
    }

    #[test]
    fn test_ffmetadata_rendering() {
        let mut builder = ManifestBuilder::new(1.0);
        builder.push_chapter(0, "Intro", 2.5);
        builder.push_chapter(1, "Q=A; Notes", 1.0);
        let text = builder.build(&meta()).to_ffmetadata();

        assert!(text.starts_with(";FFMETADATA1\n"));
        assert!(text.contains("title=A Book\n"));
        assert!(text.contains("artist=Someone\n"));
        assert!(text.contains("START=0\nEND=2500\ntitle=Intro"));
        assert!(text.contains("START=3500\nEND=4500\ntitle=Q\\=A\\; Notes"));
    }
}
