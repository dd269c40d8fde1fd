use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanCropError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error(
        "Crop rectangle {x},{y} {width}x{height} exceeds page {page_index} ({page_width}x{page_height})"
    )]
    OutOfBounds {
        page_index: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        page_width: u32,
        page_height: u32,
    },

    #[error("Expected page image not found: {}", path.display())]
    MissingPage { path: PathBuf },

    #[error("Failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scale factor: {0}")]
    InvalidScale(String),

    #[error("Chunk size must be at least 1 (got {0})")]
    InvalidChunkSize(usize),

    #[error("Event {event} is not valid in state {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("No pages to process")]
    EmptyBatch,
}

impl ScanCropError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanCropError::Io {
            path: path.into(),
            source,
        }
    }
}
