//! In-memory data model for one generation run.
//!
//! Nothing here is persisted except through the writers in `formats` and `epub`.

use std::path::PathBuf;

/// Author written into every package unless the config overrides it.
pub const DEFAULT_AUTHOR: &str = "AI";

/// What the operator asked for: style, premise, and length.
///
/// `characters`, `setting` and `events` are optional; the staged pipeline leans on them most.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookBrief {
    pub style: String,
    pub description: String,
    pub chapter_count: u32,
    pub characters: Option<String>,
    pub setting: Option<String>,
    pub events: Option<String>,
}

/// The generated plot outline. Shared, read-only context for every chapter prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotOutline(pub String);

impl PlotOutline {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One generated chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based generation order.
    pub index: u32,
    pub content: String,
    /// Empty until derived for the EPUB.
    pub title: String,
}

/// Outline plus chapters, before title, cover and export.
#[derive(Debug, Clone)]
pub struct Draft {
    pub outline: PlotOutline,
    pub chapters: Vec<Chapter>,
    /// The outline was typed by the operator, not generated; later regenerations keep it.
    pub outline_fixed: bool,
}

impl Draft {
    /// Chapter texts in generation order.
    pub fn texts(&self) -> Vec<&str> {
        self.chapters.iter().map(|c| c.content.as_str()).collect()
    }
}

/// Aggregate handed to the EPUB writer.
#[derive(Debug, Clone)]
pub struct Book {
    /// Sanitized title; also the output file stem.
    pub title: String,
    pub author: String,
    pub chapters: Vec<Chapter>,
    pub cover_path: Option<PathBuf>,
}
