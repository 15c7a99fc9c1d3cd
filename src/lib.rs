use std::path::PathBuf;

pub mod category;
pub mod config;
pub mod content;
pub mod html;
pub mod import;
pub mod media;
pub mod progress;
pub mod reader;
pub mod report;
pub mod repository;
pub mod sanitize;
pub mod warning;

#[cfg(test)]
mod tests;

/// Errors that abort a whole batch. Nothing has been written when one of
/// these is returned.
#[derive(Debug, thiserror::Error)]
pub enum FatalBatchError {
    #[error("CSV file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("CSV file has no data rows")]
    EmptyInput,
    #[error("failed to read CSV: {0}")]
    Csv(reader::Error),
    #[error("unknown category {label:?} at row {row}")]
    UnknownCategory { row: usize, label: String },
    #[error("no taxonomy mapped for content type {content_type} (row {row})")]
    MissingTaxonomy { row: usize, content_type: String },
}

impl From<reader::Error> for FatalBatchError {
    fn from(error: reader::Error) -> Self {
        match error {
            reader::Error::NotFound(path) => Self::FileNotFound(path),
            reader::Error::Empty => Self::EmptyInput,
            error => Self::Csv(error),
        }
    }
}
