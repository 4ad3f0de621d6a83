//! Plain-text manuscript output.

use crate::model::Chapter;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Separator between chapter blocks in the text file.
pub const CHAPTER_SEPARATOR: &str = "\n\n";

/// Errors from the plain-text writer.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Cannot write text: book has no chapters.")]
    NoChapters,

    #[error("Failed to write output: {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Chapter contents in order, joined by a blank line.
pub fn manuscript(chapters: &[Chapter]) -> String {
    chapters
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(CHAPTER_SEPARATOR)
}

/// Write the manuscript to `path`, replacing any existing file.
pub fn write_text(chapters: &[Chapter], path: &Path) -> Result<(), FormatError> {
    if chapters.is_empty() {
        return Err(FormatError::NoChapters);
    }
    let io_err = |e| FormatError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut f = File::create(path).map_err(io_err)?;
    f.write_all(manuscript(chapters).as_bytes()).map_err(io_err)?;
    Ok(())
}
