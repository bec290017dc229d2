//! PDF Font Swap Library
//!
//! Replaces the fonts text is drawn with in existing PDFs. Text shown in the
//! fonts to replace is removed from the page content streams and drawn again
//! in a replacement font, at the same position and color, scaled to keep the
//! width of the original text.
//!
//! - Standard 14 fonts or any TrueType/OpenType font file as replacement
//! - Whole lines or single words re-drawn, or white patches over the old text
//! - Text in Form XObjects is handled like page text
//!
//! # Example
//!
//! ```no_run
//! use pdf_fontswap::fonts::ReplacementFont;
//! use pdf_fontswap::pdf::{replace_fonts, ReplaceMode, ReplaceOptions};
//! use std::path::Path;
//!
//! let options = ReplaceOptions {
//!     font: ReplacementFont::by_name("Courier").expect("Unknown font"),
//!     mode: ReplaceMode::Word,
//!     pages: None,
//! };
//!
//! replace_fonts(Path::new("input.pdf"), Path::new("output.pdf"), &options)
//!     .expect("Failed to replace fonts");
//! ```

pub mod error;
pub mod fonts;
pub mod geometry;
pub mod pdf;

// Re-export commonly used items
pub use error::{Error, Result};
