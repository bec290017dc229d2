//! Removing text drawn with given fonts from content streams
//!
//! This works on the raw text of a content stream, one line at a time. A line
//! that selects one of the target fonts switches the scan into "in target
//! font" mode; while in that mode every text positioning, state or showing
//! line is blanked. `ET` or a line selecting any other font switches back.
//!
//! The scan needs one operator per line (the layout nearly every producer
//! writes). Streams that do not split into lines are rejected.

use lopdf::{Document, Object, ObjectId};
use log::{debug, warn};

use super::fontrefs::{FontRefs, StreamOwner};
use super::resources::{page_content_ids, stream_bytes};
use crate::error::{Error, Result};

/// Line endings of operators blanked while inside a target font
const TEXT_OPERATORS: [&[u8]; 12] = [
    b"TJ", b"Tj", b"TL", b"Tc", b"Td", b"Tm", b"T*", b"Ts", b"Tw", b"Tz", b"'", b"\"",
];

/// How a line that selects a font is recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorRule {
    /// The line ends with the `Tf` operator: `/F1 12 Tf`
    TfOperator,
    /// The line starts with a name: `/F1 12 Tf`, but also `/GS0 gs` or `/Im0 Do`
    NamePrefix,
}

impl SelectorRule {
    fn is_selector(self, line: &[u8]) -> bool {
        match self {
            SelectorRule::TfOperator => line.ends_with(b" Tf"),
            SelectorRule::NamePrefix => line.starts_with(b"/"),
        }
    }
}

/// The stream is empty or has no line breaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotLineOriented;

/// Split on `\n`, `\r\n` and `\r`
///
/// A trailing line break does not produce a trailing empty line.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\n' => {
                lines.push(&data[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&data[start..i]);
                if data.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Blank every line that selects or draws with one of `refs`
///
/// Each reference is a font resource name with its slash and a trailing
/// space, e.g. `b"/F1 "`. Blanked lines become empty. Returns whether any
/// line was blanked.
pub fn remove_font_text(lines: &mut [&[u8]], refs: &[Vec<u8>], rule: SelectorRule) -> bool {
    let mut changed = false;
    for reference in refs {
        let mut in_target = false;
        for line in lines.iter_mut() {
            if *line == b"ET" {
                in_target = false;
                continue;
            }
            if rule.is_selector(*line) {
                in_target = line.starts_with(reference);
                if in_target {
                    *line = b"";
                    changed = true;
                }
                continue;
            }
            if in_target && TEXT_OPERATORS.iter().any(|op| line.ends_with(op)) {
                *line = b"";
                changed = true;
            }
        }
    }
    changed
}

/// Remove text in the given fonts from one stream's decoded bytes
///
/// Returns `Ok(None)` when nothing changed, otherwise the new stream: the
/// lines joined with `\n` and a final `\n`.
pub fn clean_stream(
    data: &[u8],
    refs: &[Vec<u8>],
    rule: SelectorRule,
) -> std::result::Result<Option<Vec<u8>>, NotLineOriented> {
    let mut lines = split_lines(data);
    if lines.is_empty() || lines[0] == data {
        return Err(NotLineOriented);
    }
    if !remove_font_text(&mut lines, refs, rule) {
        return Ok(None);
    }
    let mut out = lines.join(&b'\n');
    out.push(b'\n');
    Ok(Some(out))
}

/// Remove text in the fonts to replace from all of a page's content streams
///
/// Page fonts are removed from every stream in the page's `/Contents`; fonts
/// of a Form XObject from that XObject's stream. Returns the number of
/// streams rewritten.
pub fn cont_clean(
    doc: &mut Document,
    page_id: ObjectId,
    fontrefs: &FontRefs,
    rule: SelectorRule,
) -> Result<usize> {
    let mut targets: Vec<(ObjectId, &[Vec<u8>])> = Vec::new();
    for (owner, refs) in fontrefs.iter() {
        match owner {
            StreamOwner::Page => {
                for id in page_content_ids(doc, page_id)? {
                    targets.push((id, refs.as_slice()));
                }
            }
            StreamOwner::XObject(id) => targets.push((*id, refs.as_slice())),
        }
    }

    // Every stream is checked before any is modified
    let mut cleaned_streams = Vec::new();
    for (stream_id, refs) in targets {
        let Ok(Object::Stream(stream)) = doc.get_object(stream_id) else {
            warn!("Content object {} {} R is not a stream, skipping", stream_id.0, stream_id.1);
            continue;
        };
        let data = stream_bytes(stream)?;
        match clean_stream(&data, refs, rule) {
            Ok(Some(cleaned)) => cleaned_streams.push((stream_id, cleaned)),
            Ok(None) => {}
            Err(NotLineOriented) => {
                return Err(Error::UnsupportedContent { stream: stream_id });
            }
        }
    }

    let rewritten = cleaned_streams.len();
    for (stream_id, cleaned) in cleaned_streams {
        if let Object::Stream(stream) = doc.get_object_mut(stream_id)? {
            debug!("Removed text from stream {} {} R", stream_id.0, stream_id.1);
            stream.set_plain_content(cleaned);
        }
    }
    Ok(rewritten)
}
