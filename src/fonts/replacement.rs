//! The caller-chosen font that replaces a document's original fonts
//!
//! A replacement font is either one of the standard Type1 fonts (no embedding
//! needed, WinAnsi encoded) or a TrueType/OpenType file that is shaped with
//! rustybuzz and embedded as an Identity-H Type0 font.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use rustybuzz::ttf_parser::{name_id, GlyphId};
use rustybuzz::{Face, UnicodeBuffer};

use super::encoding::unicode_to_win_ansi;
use super::standard::StandardFont;
use crate::error::{Error, Result};

/// A glyph ready to be written into a text-showing operator
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedGlyph {
    /// Character code (one byte for standard fonts, a glyph id for TrueType)
    pub code: u16,
    /// Advance width in 1/1000 em
    pub advance: f32,
    /// The text this glyph represents
    pub text: String,
}

/// A TrueType or OpenType font loaded from disk
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    name: String,
    data: Vec<u8>,
}

impl TrueTypeFont {
    fn face(&self) -> Result<Face<'_>> {
        Face::from_slice(&self.data, 0)
            .ok_or_else(|| Error::Font(format!("cannot parse font {}", self.name)))
    }
}

/// The font text is re-drawn with
#[derive(Debug, Clone)]
pub enum ReplacementFont {
    Standard(StandardFont),
    TrueType(TrueTypeFont),
}

impl ReplacementFont {
    /// Resolve a standard font by name (`times-bolditalic`, `Helvetica`, `tibi`, ...)
    pub fn by_name(name: &str) -> Result<Self> {
        StandardFont::from_name(name)
            .map(ReplacementFont::Standard)
            .ok_or_else(|| Error::UnknownFont(name.to_string()))
    }

    /// Load a TrueType/OpenType font file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Use an in-memory TrueType/OpenType font
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let face = Face::from_slice(&data, 0)
            .ok_or_else(|| Error::Font("not a TrueType/OpenType font".to_string()))?;

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .map(|n| n.chars().filter(|c| c.is_ascii_graphic()).collect::<String>())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "ReplacementFont".to_string());
        drop(face);

        Ok(ReplacementFont::TrueType(TrueTypeFont { name, data }))
    }

    /// Base font name, as it will appear in `/BaseFont`
    pub fn name(&self) -> &str {
        match self {
            ReplacementFont::Standard(font) => font.postscript_name(),
            ReplacementFont::TrueType(font) => &font.name,
        }
    }

    /// Whether a document font with this base name already is the replacement
    ///
    /// Subset tags are ignored and the comparison is case-insensitive, so
    /// `ABCDEF+Times-BoldItalic` matches the `tibi` replacement.
    pub fn matches_base_font(&self, base_font: &str) -> bool {
        let base = super::standard::strip_subset_prefix(base_font);
        base.eq_ignore_ascii_case(self.name())
    }

    /// Convert text to glyphs
    pub fn shape(&self, text: &str) -> Result<Vec<ShapedGlyph>> {
        match self {
            ReplacementFont::Standard(font) => Ok(text
                .chars()
                .map(|ch| {
                    let code = unicode_to_win_ansi(ch).unwrap_or(b'?');
                    ShapedGlyph {
                        code: code as u16,
                        advance: font.width(code) as f32,
                        text: ch.to_string(),
                    }
                })
                .collect()),
            ReplacementFont::TrueType(font) => shape_true_type(&font.face()?, text),
        }
    }

    /// Advance width of `text` at `fontsize`, in points
    pub fn text_length(&self, text: &str, fontsize: f32) -> Result<f32> {
        let units: f32 = self.shape(text)?.iter().map(|g| g.advance).sum();
        Ok(units * fontsize / 1000.0)
    }

    /// String operand bytes for the given glyphs
    pub fn encode(&self, glyphs: &[ShapedGlyph]) -> Vec<u8> {
        match self {
            ReplacementFont::Standard(_) => glyphs.iter().map(|g| g.code as u8).collect(),
            ReplacementFont::TrueType(_) => glyphs
                .iter()
                .flat_map(|g| g.code.to_be_bytes())
                .collect(),
        }
    }

    /// Add the font to a document
    ///
    /// `used` holds every glyph drawn with the font; TrueType fonts need it
    /// for their `/W` widths and ToUnicode map.
    pub fn embed(&self, doc: &mut Document, used: &BTreeMap<u16, ShapedGlyph>) -> Result<ObjectId> {
        match self {
            ReplacementFont::Standard(font) => Ok(embed_standard(doc, *font)),
            ReplacementFont::TrueType(font) => embed_true_type(doc, font, used),
        }
    }
}

fn shape_true_type(face: &Face<'_>, text: &str) -> Result<Vec<ShapedGlyph>> {
    let scale = 1000.0 / face.units_per_em().max(1) as f32;

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.guess_segment_properties();
    let output = rustybuzz::shape(face, &[], buffer);
    let infos = output.glyph_infos();

    // Byte ranges of each cluster, so ligatures map back to all their chars
    let mut boundaries: Vec<usize> = infos.iter().map(|g| g.cluster as usize).collect();
    boundaries.push(text.len());
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut glyphs = Vec::with_capacity(infos.len());
    for info in infos {
        let gid = info.glyph_id as u16;
        let start = (info.cluster as usize).min(text.len());
        let end = boundaries
            .iter()
            .copied()
            .find(|&b| b > start)
            .unwrap_or(text.len());
        let advance = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0) as f32 * scale;
        glyphs.push(ShapedGlyph {
            code: gid,
            advance,
            text: text.get(start..end).unwrap_or_default().to_string(),
        });
    }
    Ok(glyphs)
}

/// Reference one of the standard fonts (nothing to embed)
fn embed_standard(doc: &mut Document, font: StandardFont) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Font".to_vec()));
    dict.set("Subtype", Object::Name(b"Type1".to_vec()));
    dict.set("BaseFont", Object::Name(font.postscript_name().as_bytes().to_vec()));
    dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    doc.add_object(Object::Dictionary(dict))
}

/// Embed a TrueType font as a Type0 font with Identity-H encoding
fn embed_true_type(
    doc: &mut Document,
    font: &TrueTypeFont,
    used: &BTreeMap<u16, ShapedGlyph>,
) -> Result<ObjectId> {
    let face = font.face()?;
    let scale = 1000.0 / face.units_per_em().max(1) as f32;
    let units = |v: i16| Object::Integer((v as f32 * scale).round() as i64);
    let base_font = Object::Name(font.name.as_bytes().to_vec());

    // Font program
    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", Object::Integer(font.data.len() as i64));
    let font_stream_id = doc.add_object(Stream::new(font_stream_dict, font.data.clone()));

    let bbox = face.global_bounding_box();
    let mut descriptor = Dictionary::new();
    descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    descriptor.set("FontName", base_font.clone());
    descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
    descriptor.set("FontBBox", Object::Array(vec![
        units(bbox.x_min),
        units(bbox.y_min),
        units(bbox.x_max),
        units(bbox.y_max),
    ]));
    descriptor.set("ItalicAngle", Object::Integer(face.italic_angle().unwrap_or(0.0).round() as i64));
    descriptor.set("Ascent", units(face.ascender()));
    descriptor.set("Descent", units(face.descender()));
    descriptor.set("CapHeight", units(face.capital_height().unwrap_or(face.ascender())));
    descriptor.set("StemV", Object::Integer(80));
    descriptor.set("FontFile2", Object::Reference(font_stream_id));
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    // Widths of the glyphs actually drawn: [gid [w] gid [w] ...]
    let mut widths = Vec::with_capacity(used.len() * 2);
    for (gid, glyph) in used {
        widths.push(Object::Integer(*gid as i64));
        widths.push(Object::Array(vec![Object::Integer(glyph.advance.round() as i64)]));
    }

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", Object::Name(b"Font".to_vec()));
    cid_font.set("Subtype", Object::Name(b"CIDFontType2".to_vec()));
    cid_font.set("BaseFont", base_font.clone());
    cid_font.set("CIDSystemInfo", Object::Dictionary(Dictionary::from_iter(vec![
        ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
        ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
        ("Supplement", Object::Integer(0)),
    ])));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    cid_font.set("DW", Object::Integer(1000));
    cid_font.set("W", Object::Array(widths));
    cid_font.set("CIDToGIDMap", Object::Name(b"Identity".to_vec()));
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let to_unicode_id = doc.add_object(Stream::new(
        Dictionary::new(),
        to_unicode_cmap(used).into_bytes(),
    ));

    let mut type0 = Dictionary::new();
    type0.set("Type", Object::Name(b"Font".to_vec()));
    type0.set("Subtype", Object::Name(b"Type0".to_vec()));
    type0.set("BaseFont", base_font);
    type0.set("Encoding", Object::Name(b"Identity-H".to_vec()));
    type0.set("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)]));
    type0.set("ToUnicode", Object::Reference(to_unicode_id));

    Ok(doc.add_object(Object::Dictionary(type0)))
}

/// Build a ToUnicode CMap for the drawn glyphs
fn to_unicode_cmap(used: &BTreeMap<u16, ShapedGlyph>) -> String {
    let entries: Vec<(u16, String)> = used
        .iter()
        .filter(|(_, g)| !g.text.is_empty())
        .map(|(gid, g)| {
            let utf16: String = g.text.encode_utf16().map(|u| format!("{:04X}", u)).collect();
            (*gid, utf16)
        })
        .collect();

    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo\n\
         << /Registry (Adobe)\n\
         /Ordering (UCS)\n\
         /Supplement 0\n\
         >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );
    // At most 100 entries per bfchar block
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, utf16) in chunk {
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, utf16));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        let font = ReplacementFont::by_name("times-bolditalic").unwrap();
        assert_eq!(font.name(), "Times-BoldItalic");
        assert!(matches!(
            ReplacementFont::by_name("no-such-font"),
            Err(Error::UnknownFont(_))
        ));
    }

    #[test]
    fn test_matches_base_font() {
        let font = ReplacementFont::by_name("tibi").unwrap();
        assert!(font.matches_base_font("ABCDEF+Times-BoldItalic"));
        assert!(font.matches_base_font("times-bolditalic"));
        assert!(!font.matches_base_font("Times-Roman"));
    }

    #[test]
    fn test_standard_shape_and_encode() {
        let font = ReplacementFont::by_name("helv").unwrap();
        let glyphs = font.shape("A\u{2014}\u{4E2D}").unwrap();
        assert_eq!(glyphs.len(), 3);
        assert_eq!(font.encode(&glyphs), vec![b'A', 0x97, b'?']);
        assert_eq!(glyphs[0].advance, 667.0);
    }

    #[test]
    fn test_standard_text_length() {
        let font = ReplacementFont::by_name("cour").unwrap();
        let len = font.text_length("hello", 12.0).unwrap();
        assert!((len - 36.0).abs() < 1e-4);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = ReplacementFont::from_bytes(b"definitely not a font".to_vec());
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = ReplacementFont::from_file(Path::new("missing-font.ttf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_to_unicode_cmap_entries() {
        let mut used = BTreeMap::new();
        used.insert(36, ShapedGlyph { code: 36, advance: 600.0, text: "A".to_string() });
        used.insert(412, ShapedGlyph { code: 412, advance: 550.0, text: "fi".to_string() });
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<019C> <00660069>"));
    }

    #[test]
    fn test_embed_standard() {
        let mut doc = Document::with_version("1.5");
        let font = ReplacementFont::by_name("Times-Roman").unwrap();
        let id = font.embed(&mut doc, &BTreeMap::new()).unwrap();
        let dict = doc.get_dictionary(id).unwrap();
        assert_eq!(dict.get(b"BaseFont").unwrap().as_name().unwrap(), b"Times-Roman");
        assert_eq!(dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Type1");
    }

    fn system_font() -> Option<ReplacementFont> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        ]
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .and_then(|p| ReplacementFont::from_file(p).ok())
    }

    #[test]
    fn test_embed_true_type_descriptor() {
        let Some(font) = system_font() else {
            eprintln!("Skipping TrueType embedding test: no system font found");
            return;
        };
        let mut doc = Document::with_version("1.5");
        let used: BTreeMap<u16, ShapedGlyph> = font
            .shape("Hi")
            .unwrap()
            .into_iter()
            .map(|g| (g.code, g))
            .collect();
        let id = font.embed(&mut doc, &used).unwrap();

        let type0 = doc.get_dictionary(id).unwrap();
        assert_eq!(type0.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        let cid_id = type0.get(b"DescendantFonts").unwrap().as_array().unwrap()[0]
            .as_reference()
            .unwrap();
        let cid_font = doc.get_dictionary(cid_id).unwrap();
        let descriptor_id = cid_font.get(b"FontDescriptor").unwrap().as_reference().unwrap();
        let descriptor = doc.get_dictionary(descriptor_id).unwrap();
        // Upright fonts have no italic angle
        assert_eq!(descriptor.get(b"ItalicAngle").unwrap().as_i64().unwrap(), 0);
        assert_eq!(cid_font.get(b"W").unwrap().as_array().unwrap().len(), used.len() * 2);
    }
}
