//! TTS-oriented text cleanup
//!
//! Normalizes extracted chapter text so the synthesis engines receive
//! speakable input: smart quotes and dashes flattened, URLs and e-mail
//! addresses dropped, common abbreviations expanded, whitespace collapsed.

use regex::Regex;

/// Abbreviations expanded for better pronunciation
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Mr.", "Mister"),
    ("Mrs.", "Missus"),
    ("Ms.", "Miss"),
    ("Dr.", "Doctor"),
    ("Prof.", "Professor"),
    ("St.", "Saint"),
    ("Jr.", "Junior"),
    ("Sr.", "Senior"),
    ("vs.", "versus"),
    ("etc.", "etcetera"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("et al.", "and others"),
];

/// Text cleaner with precompiled patterns
#[derive(Debug)]
pub struct TextCleaner {
    url: Regex,
    email: Regex,
    whitespace: Regex,
    expand_abbreviations: bool,
    remove_urls: bool,
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl TextCleaner {
    pub fn new(expand_abbreviations: bool, remove_urls: bool) -> Self {
        Self {
            url: Regex::new(r"https?://[^\s]+").expect("static regex"),
            email: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("static regex"),
            whitespace: Regex::new(r"\s+").expect("static regex"),
            expand_abbreviations,
            remove_urls,
        }
    }

    /// Clean a block of extracted text for synthesis
    pub fn clean(&self, text: &str) -> String {
        let mut result = normalize_punctuation(text);

        if self.remove_urls {
            result = self.url.replace_all(&result, " ").into_owned();
            result = self.email.replace_all(&result, " ").into_owned();
        }

        if self.expand_abbreviations {
            for (abbrev, expansion) in ABBREVIATIONS {
                result = result.replace(abbrev, expansion);
            }
        }

        self.whitespace.replace_all(&result, " ").trim().to_string()
    }
}

/// Flatten typographic punctuation the engines mispronounce
fn normalize_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '`' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2026}' => '.',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect()
}
