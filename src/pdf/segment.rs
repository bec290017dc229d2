//! Cutting extracted spans into the units that get re-drawn

use crate::geometry::{Point, Rect};

use super::extract::TextSpan;

/// Unit of text that is re-drawn as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Whole spans
    Span,
    /// Whitespace separated words inside a span
    Word,
}

/// A piece of text to re-draw, with where and how it was drawn originally
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub origin: Point,
    pub bbox: Rect,
    /// Font size of the span the text came from
    pub size: f32,
    /// sRGB `0xRRGGBB`
    pub color: u32,
}

/// Replace the Unicode replacement character with a pilcrow
///
/// Undecodable codes come out of extraction as U+FFFD; a visible mark keeps
/// them noticeable in the re-drawn text.
pub fn sanitize(text: &str) -> String {
    text.replace('\u{FFFD}', "\u{B6}")
}

fn is_whitespace(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_whitespace)
}

/// Split a span into words
///
/// Whitespace ends the current word. A word takes the origin of its first
/// non-space character and the union of its characters' boxes. Empty words
/// are dropped.
pub fn words(span: &TextSpan) -> Vec<Segment> {
    let mut words: Vec<(String, Option<Point>, Rect)> = Vec::new();
    for ch in &span.chars {
        if is_whitespace(&ch.text) {
            words.push((String::new(), None, Rect::default()));
            continue;
        }
        if words.is_empty() {
            words.push((String::new(), None, Rect::default()));
        }
        if let Some((text, origin, bbox)) = words.last_mut() {
            origin.get_or_insert(ch.origin);
            *bbox = bbox.union(&ch.bbox);
            text.push_str(&ch.text);
        }
    }

    words
        .into_iter()
        .filter_map(|(text, origin, bbox)| {
            origin.map(|origin| Segment {
                text: sanitize(&text),
                origin,
                bbox,
                size: span.size,
                color: span.color,
            })
        })
        .collect()
}

/// The re-draw units of a span at the given granularity
pub fn segments(span: &TextSpan, granularity: Granularity) -> Vec<Segment> {
    match granularity {
        Granularity::Word => words(span),
        Granularity::Span => vec![Segment {
            text: sanitize(&span.text),
            origin: span.origin,
            bbox: span.bbox,
            size: span.size,
            color: span.color,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::extract::TextChar;

    fn span(text: &str) -> TextSpan {
        // Each char 5 wide, 10 tall, starting at x = 100
        let chars: Vec<TextChar> = text
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let x = 100.0 + 5.0 * i as f32;
                TextChar {
                    text: c.to_string(),
                    origin: Point::new(x, 500.0),
                    bbox: Rect::new(x, 498.0, x + 5.0, 508.0),
                }
            })
            .collect();
        TextSpan {
            font: "Helvetica".to_string(),
            size: 10.0,
            color: 0x336699,
            origin: Point::new(100.0, 500.0),
            bbox: Rect::new(100.0, 498.0, 100.0 + 5.0 * chars.len() as f32, 508.0),
            text: text.to_string(),
            chars,
        }
    }

    #[test]
    fn test_words_split_on_whitespace() {
        let words = words(&span("ab  cd"));
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "ab");
        assert_eq!(words[0].origin, Point::new(100.0, 500.0));
        assert_eq!(words[0].bbox, Rect::new(100.0, 498.0, 110.0, 508.0));
        assert_eq!(words[1].text, "cd");
        assert_eq!(words[1].origin, Point::new(120.0, 500.0));
        assert_eq!(words[1].color, 0x336699);
        assert_eq!(words[1].size, 10.0);
    }

    #[test]
    fn test_leading_and_trailing_space() {
        let words = words(&span(" x "));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "x");
        assert_eq!(words[0].origin, Point::new(105.0, 500.0));
    }

    #[test]
    fn test_only_whitespace_has_no_words() {
        assert!(words(&span("   ")).is_empty());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a\u{FFFD}b"), "a\u{B6}b");
        let segments = segments(&span("x\u{FFFD}"), Granularity::Span);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "x\u{B6}");
    }
}
