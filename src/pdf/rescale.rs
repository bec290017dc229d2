//! Font size of the re-drawn text
//!
//! The replacement font has different widths than the original, so text is
//! re-drawn at the size that makes it as wide as the original bounding box.

use crate::error::Result;
use crate::fonts::ReplacementFont;
use crate::geometry::Rect;

/// Size at which `text` in `font` is exactly as wide as `bbox`
///
/// `size` is the original size; it is kept when the text has no width.
pub fn resize(text: &str, bbox: &Rect, size: f32, font: &ReplacementFont) -> Result<f32> {
    let length = font.text_length(text, size)?;
    if length <= 0.0 {
        return Ok(size);
    }
    Ok(bbox.width() / length * size)
}

/// Size for a single word: fit the box, but never grow past the original
pub fn word_size(text: &str, bbox: &Rect, size: f32, font: &ReplacementFont) -> Result<f32> {
    Ok(size.min(resize(text, bbox, size, font)?))
}

/// Size for text that does not run along the x axis
///
/// The axis-aligned box of tilted text is larger than the text itself, so
/// the original size is only reduced when the text would be longer than the
/// box's larger side.
pub fn tilted_size(text: &str, bbox: &Rect, size: f32, font: &ReplacementFont) -> Result<f32> {
    let length = font.text_length(text, size)?;
    let limit = bbox.width().max(bbox.height());
    if length > limit && length > 0.0 {
        Ok(size * limit / length)
    } else {
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courier() -> ReplacementFont {
        ReplacementFont::by_name("Courier").unwrap()
    }

    #[test]
    fn test_resize_fits_width() {
        // 4 Courier chars at 10pt are 24pt wide
        let bbox = Rect::new(0.0, 0.0, 48.0, 10.0);
        let size = resize("abcd", &bbox, 10.0, &courier()).unwrap();
        assert!((size - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_resize_empty_text_keeps_size() {
        let bbox = Rect::new(0.0, 0.0, 48.0, 10.0);
        assert_eq!(resize("", &bbox, 11.0, &courier()).unwrap(), 11.0);
    }

    #[test]
    fn test_word_size_never_grows() {
        let wide = Rect::new(0.0, 0.0, 48.0, 10.0);
        assert_eq!(word_size("abcd", &wide, 10.0, &courier()).unwrap(), 10.0);
        let narrow = Rect::new(0.0, 0.0, 12.0, 10.0);
        assert!((word_size("abcd", &narrow, 10.0, &courier()).unwrap() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_tilted_size() {
        // Vertical text: the box is tall and narrow
        let tall = Rect::new(0.0, 0.0, 10.0, 30.0);
        assert_eq!(tilted_size("abcd", &tall, 10.0, &courier()).unwrap(), 10.0);
        let short = Rect::new(0.0, 0.0, 10.0, 12.0);
        assert!((tilted_size("abcd", &short, 10.0, &courier()).unwrap() - 5.0).abs() < 1e-4);
    }
}
