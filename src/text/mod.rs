//! Text preparation: cleanup and chunk planning

pub mod chunker;
pub mod cleaner;

pub use chunker::{plan_book, plan_chapter, TextChunk};
pub use cleaner::TextCleaner;
