//! Chunk planning
//!
//! Splits a chapter's plain text into an ordered sequence of bounded-length
//! synthesis units. Sentences are packed greedily up to the configured
//! character budget; a sentence longer than the budget is itself split at
//! clause boundaries, then whitespace, then hard-split as a last resort, so
//! no chunk ever exceeds the limit. Planning is deterministic: identical
//! text and settings always yield the identical chunk sequence.

use crate::book::Chapter;

/// Sentence-ending punctuation characters
const SENTENCE_ENDINGS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Clause-separating punctuation (for fallback splitting)
const CLAUSE_SEPARATORS: &[char] = &[',', ';', ':', '，', '；', '：'];

/// A bounded-length unit of chapter text submitted to synthesis as one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chapter this chunk belongs to
    pub chapter: usize,
    /// Position within the chapter; defines reassembly order
    pub seq: usize,
    pub text: String,
}

impl TextChunk {
    /// Estimated synthesis cost, in characters
    pub fn cost(&self) -> usize {
        self.text.chars().count()
    }

    /// Stable identifier for failure reports
    pub fn id(&self) -> String {
        format!("{}:{}", self.chapter, self.seq)
    }
}

/// Plan the chunk sequence for one chapter.
///
/// Empty or whitespace-only chapters yield zero chunks; the chapter still
/// receives a zero-duration entry downstream.
pub fn plan_chapter(chapter: &Chapter, max_chars: usize) -> Vec<TextChunk> {
    if chapter.is_empty() {
        return vec![];
    }
    let body = chapter.body.trim();

    let mut pieces: Vec<String> = Vec::new();
    for sentence in split_sentences(body) {
        if char_len(sentence) > max_chars {
            pieces.extend(split_long_sentence(sentence, max_chars));
        } else {
            pieces.push(sentence.to_string());
        }
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(&piece);
        if !current.is_empty() && current_len + 1 + piece_len > max_chars {
            chunks.push(current);
            current = String::new();
            current_len = 0;
        }
        if current.is_empty() {
            current = piece;
            current_len = piece_len;
        } else {
            current.push(' ');
            current.push_str(&piece);
            current_len += 1 + piece_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(seq, text)| TextChunk {
            chapter: chapter.index,
            seq,
            text,
        })
        .collect()
}

/// Plan chunks for every chapter of a book, in chapter order
pub fn plan_book(chapters: &[Chapter], max_chars: usize) -> Vec<TextChunk> {
    chapters
        .iter()
        .flat_map(|chapter| plan_chapter(chapter, max_chars))
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text into sentences, keeping terminal punctuation attached
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut at_ending = false;

    for (idx, c) in text.char_indices() {
        if SENTENCE_ENDINGS.contains(&c) {
            at_ending = true;
        } else if at_ending && c.is_whitespace() {
            let sentence = text[start..idx].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = idx;
            at_ending = false;
        } else {
            at_ending = false;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Split an oversized sentence into pieces no longer than `max_chars`.
///
/// Prefers the last clause separator in the window, then the last
/// whitespace, then a hard split.
fn split_long_sentence(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = sentence;

    while !remaining.is_empty() {
        if char_len(remaining) <= max_chars {
            pieces.push(remaining.trim().to_string());
            break;
        }

        let window_end = byte_index_of_char(remaining, max_chars);
        let window = &remaining[..window_end];

        let split_at = find_last_boundary(window, CLAUSE_SEPARATORS)
            .map(|i| i + 1) // keep the separator with the left piece
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        let (piece, rest) = remaining.split_at(split_at);
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = rest.trim_start();
    }

    pieces
}

/// Byte index of the `n`-th character, or the string length if shorter
fn byte_index_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Byte position of the last occurrence of any of `boundaries`
fn find_last_boundary(text: &str, boundaries: &[char]) -> Option<usize> {
    text.char_indices()
        .rev()
        .find(|(_, c)| boundaries.contains(c))
        .map(|(i, c)| i + c.len_utf8() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Chapter;

    fn chapter(body: &str) -> Chapter {
        Chapter::new(0, "Test", body)
    }

    #[test]
    fn test_empty_chapter_yields_no_chunks() {
        assert!(plan_chapter(&chapter(""), 100).is_empty());
        assert!(plan_chapter(&chapter("   \n\t "), 100).is_empty());
    }

    #[test]
    fn test_short_chapter_is_single_chunk() {
        let chunks = plan_chapter(&chapter("One sentence only."), 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "One sentence only.");
        assert_eq!(chunks[0].seq, 0);
    }

    #[test]
    fn test_sentences_packed_up_to_limit() {
        let body = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = plan_chapter(&chapter(body), 45);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.cost() <= 45, "chunk too long: {:?}", chunk.text);
        }
        // Sequence indices are contiguous from zero
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq, i);
        }
    }

    #[test]
    fn test_oversized_sentence_split_at_clause() {
        let body = "alpha beta gamma, delta epsilon zeta, eta theta iota kappa lambda";
        let chunks = plan_chapter(&chapter(body), 25);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.cost() <= 25, "chunk too long: {:?}", chunk.text);
        }
    }

    #[test]
    fn test_hard_split_without_any_boundary() {
        let body = "a".repeat(90);
        let chunks = plan_chapter(&chapter(&body), 40);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.cost() <= 40));
    }

    #[test]
    fn test_round_trip_modulo_whitespace() {
        let body = "One two three. Four five six! Seven, eight; nine? Ten.";
        let chunks = plan_chapter(&chapter(body), 20);
        let joined: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(squash(&joined), squash(body));
    }

    #[test]
    fn test_planning_is_deterministic() {
        let body = "Some long paragraph. It repeats, with clauses; and more. Done!";
        let a = plan_chapter(&chapter(body), 30);
        let b = plan_chapter(&chapter(body), 30);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_text_respects_char_budget() {
        let body = "日本語のテキスト。これは長い文です。さらに続きます。";
        let chunks = plan_chapter(&chapter(body), 10);
        for chunk in &chunks {
            assert!(chunk.cost() <= 10);
        }
    }
}
