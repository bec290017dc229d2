//! Fonts the text can be re-drawn with

pub mod encoding;
pub mod replacement;
pub mod standard;

pub use replacement::{ReplacementFont, ShapedGlyph};
pub use standard::StandardFont;
