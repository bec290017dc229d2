//! Drawing the replacement text onto a page
//!
//! A `TextWriter` collects glyph runs grouped by fill color, plus any white
//! patches, and writes them to the page as one new content stream appended
//! after the (isolated) original content.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::resources::{add_page_resource, append_content_to_page, isolate_page_content};
use crate::error::Result;
use crate::fonts::{ReplacementFont, ShapedGlyph};
use crate::geometry::{Color, Point, Rect};

/// Tilted text above this size is drawn faintly
const FAINT_SIZE: f32 = 100.0;
const FAINT_OPACITY: f32 = 0.1;

#[derive(Debug, Clone)]
struct Run {
    glyphs: Vec<ShapedGlyph>,
    origin: Point,
    size: f32,
    /// `(cos, sin)` of the baseline, `None` for horizontal text
    dir: Option<(f32, f32)>,
}

impl Run {
    fn is_faint(&self) -> bool {
        self.dir.is_some() && self.size > FAINT_SIZE
    }
}

/// Collects text to draw in the replacement font
#[derive(Debug)]
pub struct TextWriter<'f> {
    font: &'f ReplacementFont,
    /// Runs per sRGB color, in order of first use
    runs: Vec<(u32, Vec<Run>)>,
    patches: Vec<Rect>,
}

impl<'f> TextWriter<'f> {
    pub fn new(font: &'f ReplacementFont) -> Self {
        Self {
            font,
            runs: Vec::new(),
            patches: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.patches.is_empty()
    }

    /// Number of text runs collected
    pub fn run_count(&self) -> usize {
        self.runs.iter().map(|(_, runs)| runs.len()).sum()
    }

    fn push(&mut self, color: u32, run: Run) {
        match self.runs.iter_mut().find(|(c, _)| *c == color) {
            Some((_, runs)) => runs.push(run),
            None => self.runs.push((color, vec![run])),
        }
    }

    /// Add horizontal text starting at `origin`
    pub fn append(&mut self, origin: Point, text: &str, size: f32, color: u32) -> Result<()> {
        let glyphs = self.font.shape(text)?;
        if glyphs.is_empty() {
            return Ok(());
        }
        self.push(color, Run { glyphs, origin, size, dir: None });
        Ok(())
    }

    /// Add text running in direction `dir` from `origin`
    pub fn append_tilted(
        &mut self,
        origin: Point,
        dir: (f32, f32),
        text: &str,
        size: f32,
        color: u32,
    ) -> Result<()> {
        let glyphs = self.font.shape(text)?;
        if glyphs.is_empty() {
            return Ok(());
        }
        self.push(color, Run { glyphs, origin, size, dir: Some(dir) });
        Ok(())
    }

    /// Paint a white rectangle, underneath all text of this writer
    pub fn cover(&mut self, rect: Rect) {
        if !rect.is_empty() {
            self.patches.push(rect);
        }
    }

    /// Every glyph drawn by this writer, keyed by code
    pub fn used_glyphs(&self) -> BTreeMap<u16, ShapedGlyph> {
        self.runs
            .iter()
            .flat_map(|(_, runs)| runs.iter())
            .flat_map(|run| run.glyphs.iter())
            .map(|g| (g.code, g.clone()))
            .collect()
    }

    /// Render the collected text as content stream operators
    pub fn content(&self, font_resource: &str, faint_resource: Option<&str>) -> Vec<u8> {
        let mut content = String::new();

        if !self.patches.is_empty() {
            content.push_str("q\n1 1 1 rg\n");
            for rect in &self.patches {
                content.push_str(&format!(
                    "{} {} {} {} re f\n",
                    num(rect.x0),
                    num(rect.y0),
                    num(rect.width()),
                    num(rect.height())
                ));
            }
            content.push_str("Q\n");
        }

        for (color, runs) in &self.runs {
            let c = Color::from_srgb(*color);
            for run in runs {
                content.push_str("q\n");
                if let (true, Some(gs)) = (run.is_faint(), faint_resource) {
                    content.push_str(&format!("/{} gs\n", gs));
                }
                content.push_str(&format!("{} {} {} rg\n", num(c.r), num(c.g), num(c.b)));
                content.push_str("BT\n");
                content.push_str(&format!("/{} {} Tf\n", font_resource, num(run.size)));
                let (cos, sin) = run.dir.unwrap_or((1.0, 0.0));
                content.push_str(&format!(
                    "{} {} {} {} {} {} Tm\n",
                    num(cos),
                    num(sin),
                    num(-sin),
                    num(cos),
                    num(run.origin.x),
                    num(run.origin.y)
                ));
                content.push_str(&format!("<{}> Tj\n", hex(&self.font.encode(&run.glyphs))));
                content.push_str("ET\nQ\n");
            }
        }
        content.into_bytes()
    }

    /// Add the collected text to a page
    ///
    /// `font_id` is the replacement font's object; it is added to the page
    /// resources under a fresh name. The original content is wrapped in
    /// `q`/`Q` so the new stream draws in default page coordinates.
    /// Returns whether anything was written.
    pub fn write(&self, doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }

        let font_resource = add_page_resource(doc, page_id, "Font", "FR", font_id)?;
        let needs_faint = self.runs.iter().any(|(_, runs)| runs.iter().any(Run::is_faint));
        let faint_resource = if needs_faint {
            let mut gs = Dictionary::new();
            gs.set("Type", Object::Name(b"ExtGState".to_vec()));
            gs.set("ca", Object::Real(FAINT_OPACITY));
            gs.set("CA", Object::Real(FAINT_OPACITY));
            let gs_id = doc.add_object(Object::Dictionary(gs));
            Some(add_page_resource(doc, page_id, "ExtGState", "GSR", gs_id)?)
        } else {
            None
        };

        let content = self.content(&font_resource, faint_resource.as_deref());
        isolate_page_content(doc, page_id)?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        append_content_to_page(doc, page_id, content_id)?;
        Ok(true)
    }
}

/// Format a number for a content stream: at most 3 decimals, no trailing zeros
fn num(v: f32) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
