//! Error types for the font substitution library

use std::path::PathBuf;
use lopdf::ObjectId;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the font substitution library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Requested page does not exist
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: usize },

    /// Replacement font name is not known
    #[error("Unknown replacement font: {0}")]
    UnknownFont(String),

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// A content stream could not be split into lines for text removal
    #[error("Cannot process content stream {} {} R: not line oriented", .stream.0, .stream.1)]
    UnsupportedContent { stream: ObjectId },

    /// General error
    #[error("{0}")]
    General(String),
}
