//! Font replacement for pages and documents
//!
//! For each page: extract the positioned text, find the fonts to replace,
//! remove their text from the content streams, and draw the same text again
//! in the replacement font, sized to the original bounding boxes.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Document, ObjectId};
use log::{debug, info, warn};

use super::content_filter::{cont_clean, SelectorRule};
use super::extract::{extract_text, TextLine};
use super::fontrefs::get_page_fontrefs;
use super::rescale::{resize, tilted_size, word_size};
use super::segment::{segments, Granularity, Segment};
use super::writer::TextWriter;
use crate::error::{Error, Result};
use crate::fonts::{ReplacementFont, ShapedGlyph, StandardFont};

/// How original text is hidden and re-drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceMode {
    /// Remove text from the content streams, re-draw whole spans
    Line,
    /// Remove text from the content streams, re-draw word by word
    #[default]
    Word,
    /// Paint white boxes over spans and draw the spans on top
    Patch,
}

impl ReplaceMode {
    fn selector_rule(self) -> SelectorRule {
        match self {
            ReplaceMode::Line => SelectorRule::TfOperator,
            ReplaceMode::Word | ReplaceMode::Patch => SelectorRule::NamePrefix,
        }
    }

    fn granularity(self) -> Granularity {
        match self {
            ReplaceMode::Word => Granularity::Word,
            ReplaceMode::Line | ReplaceMode::Patch => Granularity::Span,
        }
    }
}

/// Options for replacing fonts in a PDF file
#[derive(Debug, Clone)]
pub struct ReplaceOptions {
    /// Font to draw the text with
    pub font: ReplacementFont,
    pub mode: ReplaceMode,
    /// 1-based page numbers; `None` for all pages
    pub pages: Option<Vec<u32>>,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            font: ReplacementFont::Standard(StandardFont::TimesBoldItalic),
            mode: ReplaceMode::Word,
            pages: None,
        }
    }
}

/// What happened to one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Every font on the page already is the replacement font
    NoFontsToReplace,
    Replaced {
        /// Spans whose text was re-drawn
        spans: usize,
        /// Text runs written in the replacement font
        written: usize,
    },
}

/// Summary of a whole-document replacement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Pages in the document
    pub page_count: usize,
    /// Pages that had text re-drawn
    pub pages_replaced: usize,
    /// Pages that needed no change
    pub pages_unchanged: usize,
    /// Text runs written over all pages
    pub runs_written: usize,
}

/// Object ID for the replacement font, filled in once all pages are done
///
/// Embedded TrueType fonts need the complete set of glyphs used on every
/// page, so the font object is only built at the end.
struct FontSlot {
    id: ObjectId,
    used: BTreeMap<u16, ShapedGlyph>,
    referenced: bool,
}

impl FontSlot {
    fn reserve(doc: &mut Document) -> Self {
        Self {
            id: doc.new_object_id(),
            used: BTreeMap::new(),
            referenced: false,
        }
    }

    fn finish(self, doc: &mut Document, font: &ReplacementFont) -> Result<()> {
        if !self.referenced {
            return Ok(());
        }
        let built = font.embed(doc, &self.used)?;
        let object = doc
            .objects
            .remove(&built)
            .ok_or_else(|| Error::General("embedded font object missing".to_string()))?;
        doc.objects.insert(self.id, object);
        Ok(())
    }
}

/// Replace the fonts of one page (1-based page number)
///
/// On `Error::UnsupportedContent` the document may be partially modified and
/// should be discarded.
pub fn replace_page_fonts(
    doc: &mut Document,
    page_number: u32,
    font: &ReplacementFont,
    mode: ReplaceMode,
) -> Result<PageOutcome> {
    let mut outcomes = replace_pages(doc, &[page_number], font, mode)?;
    outcomes
        .pop()
        .ok_or_else(|| Error::General("no page processed".to_string()))
}

/// Replace the fonts of several pages (1-based page numbers)
///
/// Text of all pages is extracted before any content is changed, so pages
/// sharing a Form XObject all get its text re-drawn.
pub fn replace_pages(
    doc: &mut Document,
    pages: &[u32],
    font: &ReplacementFont,
    mode: ReplaceMode,
) -> Result<Vec<PageOutcome>> {
    let page_map = doc.get_pages();
    let mut page_ids = Vec::with_capacity(pages.len());
    for &number in pages {
        let id = page_map.get(&number).copied().ok_or(Error::PageOutOfRange {
            page: number,
            count: page_map.len(),
        })?;
        page_ids.push((number, id));
    }

    let mut extracted = Vec::with_capacity(page_ids.len());
    for &(number, page_id) in &page_ids {
        let lines = extract_text(doc, page_id)?;
        debug!("Page {}: {} text lines", number, lines.len());
        extracted.push((number, page_id, lines));
    }

    let mut slot = FontSlot::reserve(doc);
    let mut outcomes = Vec::with_capacity(extracted.len());
    for (number, page_id, lines) in extracted {
        let outcome = replace_on_page(doc, page_id, &lines, font, mode, &mut slot)?;
        match outcome {
            PageOutcome::NoFontsToReplace => debug!("Page {}: no fonts to replace", number),
            PageOutcome::Replaced { spans, written } => {
                debug!("Page {}: re-drew {} spans as {} runs", number, spans, written)
            }
        }
        outcomes.push(outcome);
    }
    slot.finish(doc, font)?;
    Ok(outcomes)
}

fn replace_on_page(
    doc: &mut Document,
    page_id: ObjectId,
    lines: &[TextLine],
    font: &ReplacementFont,
    mode: ReplaceMode,
    slot: &mut FontSlot,
) -> Result<PageOutcome> {
    let has_target_text = lines
        .iter()
        .flat_map(|line| line.spans.iter())
        .any(|span| !font.matches_base_font(&span.font));

    if mode == ReplaceMode::Patch {
        if !has_target_text {
            return Ok(PageOutcome::NoFontsToReplace);
        }
    } else {
        let fontrefs = get_page_fontrefs(doc, page_id, font)?;
        if fontrefs.is_empty() {
            return Ok(PageOutcome::NoFontsToReplace);
        }
        cont_clean(doc, page_id, &fontrefs, mode.selector_rule())?;
    }

    let mut writer = TextWriter::new(font);
    let mut spans = 0;
    for line in lines {
        for span in &line.spans {
            if font.matches_base_font(&span.font) || span.text.trim().is_empty() {
                continue;
            }
            spans += 1;

            if mode == ReplaceMode::Patch {
                writer.cover(span.bbox);
            }
            for segment in segments(span, mode.granularity()) {
                if let Err(e) = draw_segment(&mut writer, line, &segment, font, mode) {
                    warn!("Skipping text {:?}: {}", segment.text, e);
                }
            }
        }
    }

    let written = writer.run_count();
    slot.used.extend(writer.used_glyphs());
    if writer.write(doc, page_id, slot.id)? {
        slot.referenced = true;
    }
    Ok(PageOutcome::Replaced { spans, written })
}

fn draw_segment(
    writer: &mut TextWriter<'_>,
    line: &TextLine,
    segment: &Segment,
    font: &ReplacementFont,
    mode: ReplaceMode,
) -> Result<()> {
    let Segment { text, origin, bbox, size, color } = segment;
    match mode {
        ReplaceMode::Patch => {
            let size = resize(text, bbox, *size, font)?;
            writer.append(bbox.bottom_left(), text, size, *color)
        }
        _ if !line.is_horizontal() => {
            let size = tilted_size(text, bbox, *size, font)?;
            writer.append_tilted(*origin, line.dir, text, size, *color)
        }
        ReplaceMode::Line => {
            let size = resize(text, bbox, *size, font)?;
            writer.append(*origin, text, size, *color)
        }
        ReplaceMode::Word => {
            let size = word_size(text, bbox, *size, font)?;
            writer.append(*origin, text, size, *color)
        }
    }
}

/// Replace fonts in a PDF file and save the result
///
/// Nothing is written when any selected page has content that cannot be
/// processed.
///
/// # Example
///
/// ```no_run
/// use pdf_fontswap::pdf::{replace_fonts, ReplaceMode, ReplaceOptions};
/// use std::path::Path;
///
/// let options = ReplaceOptions {
///     mode: ReplaceMode::Line,
///     ..ReplaceOptions::default()
/// };
/// replace_fonts(Path::new("input.pdf"), Path::new("output.pdf"), &options)
///     .expect("Failed to replace fonts");
/// ```
pub fn replace_fonts(input: &Path, output: &Path, options: &ReplaceOptions) -> Result<ReplaceReport> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }
    let mut doc = Document::load(input)?;
    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(Error::EmptyPdf(input.to_path_buf()));
    }

    let pages: Vec<u32> = match &options.pages {
        Some(pages) => pages.clone(),
        None => (1..=page_count as u32).collect(),
    };
    info!(
        "Replacing fonts on {} of {} pages with {} ({:?} mode)",
        pages.len(),
        page_count,
        options.font.name(),
        options.mode
    );

    let outcomes = match replace_pages(&mut doc, &pages, &options.font, options.mode) {
        Ok(outcomes) => outcomes,
        Err(e @ Error::UnsupportedContent { .. }) => {
            warn!("Cannot process {}: {}", input.display(), e);
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let mut report = ReplaceReport {
        page_count,
        ..ReplaceReport::default()
    };
    for outcome in outcomes {
        match outcome {
            PageOutcome::NoFontsToReplace => report.pages_unchanged += 1,
            PageOutcome::Replaced { written, .. } => {
                report.pages_replaced += 1;
                report.runs_written += written;
            }
        }
    }

    doc.compress();
    doc.save(output)?;
    info!("Wrote {}", output.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::resources::page_content;
    use lopdf::{dictionary, Dictionary, Object, Stream};

    /// One page, F1 = Helvetica and F2 = Times-BoldItalic
    fn sample_doc(content: &[u8]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let helv = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica",
        });
        let tibi = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Times-BoldItalic",
        });
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => helv, "F2" => tibi },
            },
        });
        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages", "Kids" => vec![page_id.into()], "Count" => 1,
        }));
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc
    }

    fn page_text(doc: &Document) -> String {
        let page_id = doc.get_pages()[&1];
        String::from_utf8_lossy(&page_content(doc, page_id).unwrap()).into_owned()
    }

    #[test]
    fn test_line_mode_replaces_span() {
        let mut doc = sample_doc(b"BT\n/F1 12 Tf\n72 700 Td\n(Hello World) Tj\nET\n");
        let font = ReplacementFont::by_name("Courier").unwrap();
        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Line).unwrap();
        assert_eq!(outcome, PageOutcome::Replaced { spans: 1, written: 1 });

        let text = page_text(&doc);
        assert!(!text.contains("(Hello World) Tj"));
        assert!(!text.contains("/F1 12 Tf"));
        // 11 Courier chars at 12pt are 79.2pt wide; the Helvetica box is 62.004pt
        assert!(text.contains("1 0 0 1 72 700 Tm"));
        assert!(text.contains("/FR0 9.39"));

        let lines = extract_text(&doc, doc.get_pages()[&1]).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans[0].text, "Hello World");
        assert_eq!(lines[0].spans[0].font, "Courier");
    }

    #[test]
    fn test_word_mode_draws_each_word() {
        let mut doc = sample_doc(b"BT\n/F1 12 Tf\n72 700 Td\n(Hello World) Tj\nET\n");
        let font = ReplacementFont::by_name("Courier").unwrap();
        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Word).unwrap();
        assert_eq!(outcome, PageOutcome::Replaced { spans: 1, written: 2 });
        assert_eq!(page_text(&doc).matches(" Tj\n").count(), 2);
    }

    #[test]
    fn test_replacement_font_text_is_kept() {
        let mut doc = sample_doc(
            b"BT\n/F2 10 Tf\n72 600 Td\n(keep) Tj\nET\nBT\n/F1 10 Tf\n72 500 Td\n(swap) Tj\nET\n",
        );
        let font = ReplacementFont::by_name("tibi").unwrap();
        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Line).unwrap();
        assert_eq!(outcome, PageOutcome::Replaced { spans: 1, written: 1 });
        let text = page_text(&doc);
        assert!(text.contains("(keep) Tj"));
        assert!(!text.contains("(swap) Tj"));
    }

    #[test]
    fn test_no_fonts_to_replace() {
        let mut doc = sample_doc(b"BT\n/F2 10 Tf\n(x) Tj\nET\n");
        // F1 (Helvetica) is listed in the resources, so only a page whose
        // fonts are all the replacement is left alone
        let page_id = doc.get_pages()[&1];
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        let fonts = page
            .get_mut(b"Resources")
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .get_mut(b"Font")
            .unwrap()
            .as_dict_mut()
            .unwrap();
        fonts.remove(b"F1");

        let font = ReplacementFont::by_name("Times-BoldItalic").unwrap();
        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Word).unwrap();
        assert_eq!(outcome, PageOutcome::NoFontsToReplace);
        assert_eq!(page_text(&doc), "BT\n/F2 10 Tf\n(x) Tj\nET\n\n");
    }

    /// Sizes of the replacement font runs, in drawing order
    fn replacement_sizes(text: &str) -> Vec<f32> {
        text.lines()
            .filter_map(|l| l.strip_prefix("/FR0 ")?.strip_suffix(" Tf")?.parse().ok())
            .collect()
    }

    #[test]
    fn test_word_mode_tilted_text() {
        let mut doc = sample_doc(b"BT\n/F1 12 Tf\n0 1 -1 0 100 100 Tm\n(ab cd) Tj\nET\n");
        let font = ReplacementFont::by_name("Courier").unwrap();
        let lines = extract_text(&doc, doc.get_pages()[&1]).unwrap();
        let expected: Vec<f32> = segments(&lines[0].spans[0], Granularity::Word)
            .iter()
            .map(|w| tilted_size(&w.text, &w.bbox, w.size, &font).unwrap())
            .collect();
        assert_eq!(expected.len(), 2);

        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Word).unwrap();
        assert_eq!(outcome, PageOutcome::Replaced { spans: 1, written: 2 });

        let text = page_text(&doc);
        assert!(!text.contains("(ab cd) Tj"));
        // Each word runs up the page from its own origin; "ab " is 16.68pt
        assert!(text.contains("0 1 -1 0 100 100 Tm"));
        assert!(text.contains("0 1 -1 0 100 116.68 Tm"));
        let sizes = replacement_sizes(&text);
        assert_eq!(sizes.len(), 2);
        for (size, expected) in sizes.iter().zip(&expected) {
            assert!((size - expected).abs() < 1e-3);
            assert!(*size <= 12.0);
        }
        assert!(!text.contains(" gs\n"));
    }

    #[test]
    fn test_large_tilted_text_is_faint() {
        let mut doc = sample_doc(
            b"BT\n/F1 120 Tf\n0 1 -1 0 300 100 Tm\n(ab) Tj\nET\nBT\n/F1 120 Tf\n72 600 Td\n(ab) Tj\nET\n",
        );
        let font = ReplacementFont::by_name("Courier").unwrap();
        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Word).unwrap();
        assert_eq!(outcome, PageOutcome::Replaced { spans: 2, written: 2 });

        let text = page_text(&doc);
        assert!(text.contains("0 1 -1 0 300 100 Tm"));
        // Only the tilted run is drawn through the faint state
        assert_eq!(text.matches("/GSR0 gs\n").count(), 1);
        assert!(replacement_sizes(&text).iter().all(|&size| size > 100.0));

        let page_id = doc.get_pages()[&1];
        let resources = doc.get_dictionary(page_id).unwrap().get(b"Resources").unwrap();
        let states = resources.as_dict().unwrap().get(b"ExtGState").unwrap().as_dict().unwrap();
        assert!(states.has(b"GSR0"));
    }

    #[test]
    fn test_patch_mode_covers_and_keeps_original() {
        let mut doc = sample_doc(b"BT /F1 12 Tf 72 700 Td (Patched) Tj ET");
        let font = ReplacementFont::by_name("helv").unwrap();
        // Helvetica text with a Helvetica replacement: nothing to patch
        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Patch).unwrap();
        assert_eq!(outcome, PageOutcome::NoFontsToReplace);

        let font = ReplacementFont::by_name("tiro").unwrap();
        let outcome = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Patch).unwrap();
        assert_eq!(outcome, PageOutcome::Replaced { spans: 1, written: 1 });
        let text = page_text(&doc);
        // Single-line content is fine for patching; the original stays
        assert!(text.contains("(Patched) Tj"));
        assert!(text.contains("1 1 1 rg"));
        assert!(text.contains(" re f\n"));
    }

    #[test]
    fn test_unsupported_content_aborts() {
        let mut doc = sample_doc(b"BT /F1 12 Tf 72 700 Td (one line) Tj ET");
        let font = ReplacementFont::by_name("tibi").unwrap();
        let result = replace_page_fonts(&mut doc, 1, &font, ReplaceMode::Word);
        assert!(matches!(result, Err(Error::UnsupportedContent { .. })));
    }

    #[test]
    fn test_page_out_of_range() {
        let mut doc = sample_doc(b"BT\nET\n");
        let font = ReplacementFont::by_name("tibi").unwrap();
        let result = replace_page_fonts(&mut doc, 3, &font, ReplaceMode::Word);
        assert!(matches!(result, Err(Error::PageOutOfRange { page: 3, count: 1 })));
    }

    #[test]
    fn test_objects_added_for_one_page() {
        let mut doc = sample_doc(b"BT\n/F1 12 Tf\n72 700 Td\n(a b) Tj\nET\n");
        let font = ReplacementFont::by_name("tibi").unwrap();
        let before = doc.objects.len();
        replace_pages(&mut doc, &[1], &font, ReplaceMode::Word).unwrap();
        // One font dictionary, one content stream, two q/Q streams
        assert_eq!(doc.objects.len(), before + 4);
    }

    #[test]
    fn test_default_options() {
        let options = ReplaceOptions::default();
        assert_eq!(options.font.name(), "Times-BoldItalic");
        assert_eq!(options.mode, ReplaceMode::Word);
        assert!(options.pages.is_none());
    }
}
