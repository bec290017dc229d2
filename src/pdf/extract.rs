//! Positioned text extraction from page content
//!
//! A small content stream interpreter that tracks the graphics and text state
//! and records every glyph drawn: its Unicode text, origin, bounding box,
//! font, size and fill color. Glyphs are then grouped into spans (same font,
//! size and color, continuing on the same baseline) and spans into lines.
//!
//! Coordinates are PDF user space of the page.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use log::{debug, warn};

use super::color_space::{lookup_color_space, ColorSpace};
use super::doc_font::DocFont;
use super::resources::{
    as_numbers, page_content, page_resources, resolve_dict, resource_category, stream_bytes,
};
use crate::error::Result;
use crate::fonts::standard::strip_subset_prefix;
use crate::geometry::{Color, Matrix, Point, Rect};

/// Form XObjects nested deeper than this are not drawn
const MAX_FORM_DEPTH: usize = 12;

/// One character as drawn on the page
#[derive(Debug, Clone, PartialEq)]
pub struct TextChar {
    /// Unicode text (several characters for ligatures)
    pub text: String,
    /// Baseline start of the glyph
    pub origin: Point,
    pub bbox: Rect,
}

/// A run of characters in one font, size and color
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// Font name without subset tag
    pub font: String,
    /// Font size as seen on the page (text matrix and CTM scaling applied)
    pub size: f32,
    /// Fill color as sRGB `0xRRGGBB`
    pub color: u32,
    /// Origin of the first character
    pub origin: Point,
    pub bbox: Rect,
    pub text: String,
    pub chars: Vec<TextChar>,
}

/// Spans sharing one writing direction and baseline
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// Writing direction as `(cos, sin)` of the baseline angle
    pub dir: (f32, f32),
    pub bbox: Rect,
    pub spans: Vec<TextSpan>,
}

impl TextLine {
    /// Whether the line runs left to right along the x axis
    pub fn is_horizontal(&self) -> bool {
        (self.dir.0 - 1.0).abs() < 1e-3 && self.dir.1.abs() < 1e-3
    }
}

/// A glyph recorded by the interpreter
#[derive(Debug, Clone)]
struct Glyph {
    text: String,
    origin: Point,
    /// Where the next glyph would start
    pen_end: Point,
    bbox: Rect,
    font: Rc<DocFont>,
    size: f32,
    color: u32,
    dir: (f32, f32),
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    fill_space: Rc<ColorSpace>,
    font: Rc<DocFont>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            fill: Color::BLACK,
            fill_space: Rc::new(ColorSpace::Gray),
            font: Rc::new(DocFont::default()),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl GraphicsState {
    /// Text rendering matrix for the current text matrix
    fn text_rendering_matrix(&self, tm: &Matrix) -> Matrix {
        let font_matrix = Matrix::new(
            self.font_size * self.h_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        );
        font_matrix.concat(tm).concat(&self.ctm)
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    fonts: HashMap<ObjectId, Rc<DocFont>>,
    /// Forms currently being drawn
    form_stack: Vec<ObjectId>,
    glyphs: Vec<Glyph>,
}

/// Extract the text of a page as lines of spans
pub fn extract_text(doc: &Document, page_id: ObjectId) -> Result<Vec<TextLine>> {
    let resources = page_resources(doc, page_id)?;
    let content = page_content(doc, page_id)?;

    let mut interpreter = Interpreter {
        doc,
        fonts: HashMap::new(),
        form_stack: Vec::new(),
        glyphs: Vec::new(),
    };
    interpreter.run(&content, &resources, GraphicsState::default());
    debug!("Page {:?}: {} glyphs", page_id, interpreter.glyphs.len());

    Ok(group_lines(interpreter.glyphs))
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

impl Interpreter<'_> {
    fn run(&mut self, data: &[u8], resources: &Dictionary, initial: GraphicsState) {
        let content = match Content::decode(data) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not parse content stream: {}", e);
                return;
            }
        };

        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::identity();
        let mut tlm = Matrix::identity();

        for op in &content.operations {
            let nums = numbers(&op.operands);
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_slice(&nums) {
                        gs.ctm = m.concat(&gs.ctm);
                    }
                }

                "g" => {
                    if let [gray] = nums[..] {
                        gs.fill = Color::gray(gray);
                        gs.fill_space = Rc::new(ColorSpace::Gray);
                    }
                }
                "rg" => {
                    if let [r, g, b] = nums[..] {
                        gs.fill = Color::rgb(r, g, b);
                        gs.fill_space = Rc::new(ColorSpace::Rgb);
                    }
                }
                "k" => {
                    if let [c, m, y, k] = nums[..] {
                        gs.fill = Color::cmyk(c, m, y, k);
                        gs.fill_space = Rc::new(ColorSpace::Cmyk);
                    }
                }
                // Pattern names among the operands are skipped by `numbers`
                "sc" | "scn" => {
                    if !nums.is_empty() || *gs.fill_space == ColorSpace::Pattern {
                        gs.fill = gs.fill_space.color(&nums);
                    }
                }
                "cs" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        let space = lookup_color_space(self.doc, resources, name);
                        gs.fill = space.initial_color();
                        gs.fill_space = Rc::new(space);
                    }
                }

                "BT" => {
                    tm = Matrix::identity();
                    tlm = Matrix::identity();
                }
                "ET" => {}
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(&size)) = (op.operands.first(), nums.last()) {
                        gs.font = self.load_font(resources, name).unwrap_or_default();
                        gs.font_size = size;
                    }
                }
                "Tc" => {
                    if let Some(&v) = nums.first() {
                        gs.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(&v) = nums.first() {
                        gs.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(&v) = nums.first() {
                        gs.h_scale = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(&v) = nums.first() {
                        gs.leading = v;
                    }
                }
                "Ts" => {
                    if let Some(&v) = nums.first() {
                        gs.rise = v;
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = nums[..] {
                        if op.operator == "TD" {
                            gs.leading = -ty;
                        }
                        tlm = Matrix::translate(tx, ty).concat(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_slice(&nums) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.leading).concat(&tlm);
                    tm = tlm;
                }

                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        if let [aw, ac, ..] = nums[..] {
                            gs.word_spacing = aw;
                            gs.char_spacing = ac;
                        }
                    }
                    tlm = Matrix::translate(0.0, -gs.leading).concat(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "TJ" => {
                    let Some(Object::Array(items)) = op.operands.first() else { continue };
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(&gs, &mut tm, bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0 * gs.font_size * gs.h_scale;
                                    tm = Matrix::translate(tx, 0.0).concat(&tm);
                                }
                            }
                        }
                    }
                }

                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.draw_form(resources, name, &gs);
                    }
                }
                _ => {}
            }
        }
    }

    fn load_font(&mut self, resources: &Dictionary, name: &[u8]) -> Option<Rc<DocFont>> {
        let doc = self.doc;
        let entry = resource_category(doc, resources, b"Font")?.get(name).ok()?;
        if let Object::Reference(id) = entry {
            if let Some(font) = self.fonts.get(id) {
                return Some(Rc::clone(font));
            }
        }
        let Some(dict) = resolve_dict(doc, entry) else {
            warn!("Font /{} is not a dictionary", String::from_utf8_lossy(name));
            return None;
        };
        let font = Rc::new(DocFont::load(doc, dict));
        if let Object::Reference(id) = entry {
            self.fonts.insert(*id, Rc::clone(&font));
        }
        Some(font)
    }

    fn draw_form(&mut self, resources: &Dictionary, name: &[u8], gs: &GraphicsState) {
        let doc = self.doc;
        let Some(Object::Reference(id)) = resource_category(doc, resources, b"XObject")
            .and_then(|xobjects| xobjects.get(name).ok())
        else {
            return;
        };
        if self.form_stack.contains(id) || self.form_stack.len() >= MAX_FORM_DEPTH {
            warn!("Skipping recursive or too deeply nested form {} {} R", id.0, id.1);
            return;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(*id) else { return };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form") {
            return;
        }
        let data = match stream_bytes(stream) {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not decode form {} {} R: {}", id.0, id.1, e);
                return;
            }
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| Matrix::from_slice(&as_numbers(doc, m)))
            .unwrap_or_default();
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r))
            .unwrap_or(resources);

        let mut nested = gs.clone();
        nested.ctm = matrix.concat(&gs.ctm);
        self.form_stack.push(*id);
        self.run(&data, form_resources, nested);
        self.form_stack.pop();
    }

    fn show(&mut self, gs: &GraphicsState, tm: &mut Matrix, bytes: &[u8]) {
        let font = Rc::clone(&gs.font);
        let ascent = font.ascent / 1000.0;
        let descent = font.descent / 1000.0;

        for ch in font.decode(bytes) {
            let trm = gs.text_rendering_matrix(tm);
            let w = ch.width / 1000.0;
            let corners = [
                trm.transform_point(Point::new(0.0, descent)),
                trm.transform_point(Point::new(w, descent)),
                trm.transform_point(Point::new(w, ascent)),
                trm.transform_point(Point::new(0.0, ascent)),
            ];
            let origin = trm.transform_point(Point::default());

            let spacing = gs.char_spacing + if ch.is_space { gs.word_spacing } else { 0.0 };
            let tx = (w * gs.font_size + spacing) * gs.h_scale;
            *tm = Matrix::translate(tx, 0.0).concat(tm);
            let pen_end = gs.text_rendering_matrix(tm).transform_point(Point::default());

            let length = trm.a.hypot(trm.b);
            let dir = if length > 0.0 {
                (trm.a / length, trm.b / length)
            } else {
                (1.0, 0.0)
            };

            self.glyphs.push(Glyph {
                text: ch.text,
                origin,
                pen_end,
                bbox: Rect::from_points(&corners),
                font: Rc::clone(&font),
                size: trm.c.hypot(trm.d),
                color: gs.fill.to_srgb(),
                dir,
            });
        }
    }
}

fn same_dir(a: (f32, f32), b: (f32, f32)) -> bool {
    (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3
}

/// Offset of `next`'s origin from where `prev` left the pen, measured along
/// and across `prev`'s baseline
fn baseline_offset(prev: &Glyph, next: &Glyph) -> (f32, f32) {
    let dx = next.origin.x - prev.pen_end.x;
    let dy = next.origin.y - prev.pen_end.y;
    let (cos, sin) = prev.dir;
    (dx * cos + dy * sin, dy * cos - dx * sin)
}

fn group_lines(glyphs: Vec<Glyph>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut prev: Option<Glyph> = None;

    for glyph in glyphs {
        let (same_line, same_span) = match &prev {
            Some(p) => {
                let (along, across) = baseline_offset(p, &glyph);
                let tolerance = p.size.max(1.0);
                let same_line = same_dir(p.dir, glyph.dir)
                    && across.abs() < tolerance * 0.5
                    && along > -tolerance
                    && along < tolerance * 3.0;
                let same_span = same_line
                    && Rc::ptr_eq(&p.font, &glyph.font)
                    && (p.size - glyph.size).abs() < 0.01
                    && p.color == glyph.color
                    && along.abs() < tolerance * 0.3;
                (same_line, same_span)
            }
            None => (false, false),
        };

        if !same_line {
            lines.push(TextLine {
                dir: glyph.dir,
                bbox: Rect::default(),
                spans: Vec::new(),
            });
        }
        let Some(line) = lines.last_mut() else { continue };
        line.bbox = line.bbox.union(&glyph.bbox);

        let text_char = TextChar {
            text: glyph.text.clone(),
            origin: glyph.origin,
            bbox: glyph.bbox,
        };
        match line.spans.last_mut() {
            Some(span) if same_span => {
                span.bbox = span.bbox.union(&glyph.bbox);
                span.text.push_str(&glyph.text);
                span.chars.push(text_char);
            }
            _ => line.spans.push(TextSpan {
                font: strip_subset_prefix(&glyph.font.name).to_string(),
                size: glyph.size,
                color: glyph.color,
                origin: glyph.origin,
                bbox: glyph.bbox,
                text: glyph.text.clone(),
                chars: vec![text_char],
            }),
        }
        prev = Some(glyph);
    }

    lines.retain(|line| !line.spans.is_empty());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn page_with(content: &[u8], xobjects: Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let helv = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica",
        });
        let times = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "XYZABC+Times-Roman",
        });
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => helv, "F2" => times },
                "XObject" => xobjects,
            },
        });
        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages", "Kids" => vec![page_id.into()], "Count" => 1,
        }));
        (doc, page_id)
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_single_span_geometry() {
        let (doc, page_id) = page_with(
            b"BT\n/F1 12 Tf\n1 0 0 rg\n72 700 Td\n(Hello World) Tj\nET\n",
            Dictionary::new(),
        );
        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].is_horizontal());
        assert_eq!(lines[0].spans.len(), 1);

        let span = &lines[0].spans[0];
        assert_eq!(span.text, "Hello World");
        assert_eq!(span.font, "Helvetica");
        assert_eq!(span.color, 0xFF0000);
        assert!(close(span.size, 12.0));
        assert_eq!(span.origin, Point::new(72.0, 700.0));
        assert_eq!(span.chars.len(), 11);
        // Helvetica advance widths sum to 5167/1000 em
        assert!(close(span.bbox.width(), 62.004));
        assert!(close(span.bbox.y0, 700.0 - 0.207 * 12.0));
        assert!(close(span.bbox.y1, 700.0 + 0.718 * 12.0));
    }

    #[test]
    fn test_font_change_splits_span() {
        let (doc, page_id) = page_with(
            b"BT\n/F1 10 Tf\n50 500 Td\n(ab) Tj\n/F2 10 Tf\n(cd) Tj\nET\n",
            Dictionary::new(),
        );
        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines.len(), 1);
        let spans = &lines[0].spans;
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].font, "Times-Roman");
        assert_eq!(spans[1].text, "cd");
    }

    #[test]
    fn test_new_line_and_kerning_gap() {
        let (doc, page_id) = page_with(
            b"BT\n/F1 12 Tf\n14 TL\n72 700 Td\n[(A) -2000 (B)] TJ\nT*\n(C) Tj\nET\n",
            Dictionary::new(),
        );
        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines.len(), 2);
        // A 24pt gap stays on the line but starts a new span
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[1].spans[0].text, "C");
        assert!(close(lines[1].spans[0].origin.y, 686.0));
    }

    #[test]
    fn test_rotated_text_direction() {
        let (doc, page_id) = page_with(
            b"BT\n/F1 10 Tf\n0 1 -1 0 100 100 Tm\n(Up) Tj\nET\n",
            Dictionary::new(),
        );
        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].is_horizontal());
        assert!(close(lines[0].dir.0, 0.0));
        assert!(close(lines[0].dir.1, 1.0));
        assert!(close(lines[0].spans[0].size, 10.0));
    }

    #[test]
    fn test_ctm_scales_size_and_color_spaces() {
        let (doc, page_id) = page_with(
            b"q\n2 0 0 2 0 0 cm\n0 1 0 0 k\nBT\n/F1 10 Tf\n10 10 Td\n(x) Tj\nET\nQ\n",
            Dictionary::new(),
        );
        let lines = extract_text(&doc, page_id).unwrap();
        let span = &lines[0].spans[0];
        assert!(close(span.size, 20.0));
        assert_eq!(span.origin, Point::new(20.0, 20.0));
        assert_eq!(span.color, 0xFF00FF);
    }

    #[test]
    fn test_separation_fill_uses_alternate_space() {
        let (mut doc, page_id) = page_with(
            b"/CS0 cs\n1 scn\nBT\n/F1 10 Tf\n(ink) Tj\nET\n/CS0 cs\n0 scn\nBT\n/F2 10 Tf\n0 -20 Td\n(paper) Tj\nET\n",
            Dictionary::new(),
        );
        let tint = dictionary! {
            "FunctionType" => 2,
            "Domain" => vec![0.into(), 1.into()],
            "C0" => vec![0.into(), 0.into(), 0.into(), 0.into()],
            "C1" => vec![0.into(), 0.into(), 0.into(), 1.into()],
            "N" => 1,
        };
        let separation: Object = vec![
            Object::Name(b"Separation".to_vec()),
            Object::Name(b"Black".to_vec()),
            Object::Name(b"DeviceCMYK".to_vec()),
            Object::Dictionary(tint),
        ]
        .into();
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        let resources = page.get_mut(b"Resources").unwrap().as_dict_mut().unwrap();
        resources.set("ColorSpace", dictionary! { "CS0" => separation });

        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans[0].text, "ink");
        assert_eq!(lines[0].spans[0].color, 0x000000);
        assert_eq!(lines[1].spans[0].text, "paper");
        assert_eq!(lines[1].spans[0].color, 0xFFFFFF);
    }

    #[test]
    fn test_device_color_space_after_cs() {
        let (doc, page_id) = page_with(
            b"/DeviceRGB cs\n0 0 1 sc\nBT\n/F1 10 Tf\n(blue) Tj\nET\n",
            Dictionary::new(),
        );
        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines[0].spans[0].color, 0x0000FF);
    }

    #[test]
    fn test_form_xobject_text() {
        let (mut doc, page_id) = page_with(b"/Fm0 Do\n", Dictionary::new());
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 50.into()],
            },
            b"BT\n/F1 8 Tf\n(form) Tj\nET\n".to_vec(),
        ));
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        let resources = page.get_mut(b"Resources").unwrap().as_dict_mut().unwrap();
        resources.set("XObject", dictionary! { "Fm0" => form_id });

        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines.len(), 1);
        let span = &lines[0].spans[0];
        assert_eq!(span.text, "form");
        assert_eq!(span.origin, Point::new(100.0, 50.0));
    }

    #[test]
    fn test_unknown_codes_become_replacement_char() {
        let (doc, page_id) = page_with(b"BT\n/F1 10 Tf\n(\\001) Tj\nET\n", Dictionary::new());
        let lines = extract_text(&doc, page_id).unwrap();
        assert_eq!(lines[0].spans[0].text, "\u{FFFD}");
    }
}
