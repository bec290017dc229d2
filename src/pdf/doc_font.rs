//! Fonts of the input document, as needed to read text back out
//!
//! A `DocFont` turns the bytes of a string operand into character codes,
//! their Unicode text and their advance widths.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::ToUnicode;
use super::resources::{as_number, as_numbers, resolve, resolve_dict, stream_bytes};
use crate::fonts::encoding::{glyph_name_to_unicode, win_ansi_to_unicode};
use crate::fonts::standard::{lookup_base_font, StandardFont};

/// Width used when a font gives no width for a code
const DEFAULT_WIDTH: f32 = 500.0;

/// One decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChar {
    pub code: u32,
    /// Unicode text, U+FFFD when the code cannot be mapped
    pub text: String,
    /// Advance width in 1/1000 text space units
    pub width: f32,
    /// Single-byte code 32, which word spacing applies to
    pub is_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f32> },
    Cid { widths: HashMap<u32, f32>, default: f32 },
    Missing,
}

/// A font dictionary from the input document
#[derive(Debug, Clone)]
pub struct DocFont {
    /// `/BaseFont` with any subset tag
    pub name: String,
    two_byte: bool,
    to_unicode: Option<ToUnicode>,
    /// Code to text from `/Encoding` for simple fonts
    encoding: Vec<Option<String>>,
    widths: Widths,
    standard: Option<StandardFont>,
    /// Glyph space to 1/1000 text space (Type3 font matrices)
    width_scale: f32,
    /// Ascender and descender in 1/1000 em
    pub ascent: f32,
    pub descent: f32,
}

impl Default for DocFont {
    fn default() -> Self {
        Self {
            name: String::new(),
            two_byte: false,
            to_unicode: None,
            encoding: win_ansi_table(),
            widths: Widths::Missing,
            standard: None,
            width_scale: 1.0,
            ascent: 800.0,
            descent: -200.0,
        }
    }
}

impl DocFont {
    /// Read a font dictionary
    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let name = match font.get(b"BaseFont") {
            Ok(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
            _ => String::new(),
        };
        let subtype = match font.get(b"Subtype") {
            Ok(Object::Name(n)) => n.clone(),
            _ => Vec::new(),
        };
        let standard = lookup_base_font(&name);

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| match resolve(doc, obj) {
                Object::Stream(stream) => stream_bytes(stream).ok(),
                _ => None,
            })
            .map(|data| ToUnicode::parse(&data))
            .filter(|map| !map.is_empty());

        let mut result = DocFont {
            name,
            to_unicode,
            standard,
            ..DocFont::default()
        };

        if subtype == b"Type0" {
            result.two_byte = true;
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|obj| match resolve(doc, obj) {
                    Object::Array(arr) => arr.first(),
                    _ => None,
                })
                .and_then(|obj| resolve_dict(doc, obj));
            if let Some(cid_font) = descendant {
                result.widths = cid_widths(doc, cid_font);
                result.read_descriptor(doc, cid_font);
            }
            return result;
        }

        if let Ok(encoding) = font.get(b"Encoding") {
            result.encoding = simple_encoding(doc, encoding);
        }
        let widths = font.get(b"Widths").ok().map(|w| as_numbers(doc, w)).unwrap_or_default();
        if !widths.is_empty() {
            let first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(|o| as_number(doc, o))
                .unwrap_or(0.0) as u32;
            result.widths = Widths::Simple { first_char, widths };
        }
        if subtype == b"Type3" {
            let matrix = font.get(b"FontMatrix").ok().map(|m| as_numbers(doc, m)).unwrap_or_default();
            if let Some(&scale) = matrix.first() {
                result.width_scale = scale * 1000.0;
            }
        }
        result.read_descriptor(doc, font);
        result
    }

    fn read_descriptor(&mut self, doc: &Document, font: &Dictionary) {
        if let Some(standard) = self.standard {
            let (ascent, descent) = standard.ascent_descent();
            self.ascent = ascent as f32;
            self.descent = descent as f32;
        }
        let Some(descriptor) = font.get(b"FontDescriptor").ok().and_then(|d| resolve_dict(doc, d)) else {
            return;
        };
        let ascent = descriptor.get(b"Ascent").ok().and_then(|o| as_number(doc, o));
        let descent = descriptor.get(b"Descent").ok().and_then(|o| as_number(doc, o));
        // Some producers write zeros; keep the defaults then
        if let (Some(a), Some(d)) = (ascent, descent) {
            if a > d && a != 0.0 {
                self.ascent = a;
                self.descent = d.min(0.0);
            }
        }
    }

    /// Split string bytes into character codes and decode each
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedChar> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = match pair {
                        [hi, lo] => u16::from_be_bytes([*hi, *lo]) as u32,
                        [single] => *single as u32,
                        _ => 0,
                    };
                    self.decode_code(code, false)
                })
                .collect()
        } else {
            bytes.iter().map(|&b| self.decode_code(b as u32, b == b' ')).collect()
        }
    }

    fn decode_code(&self, code: u32, is_space: bool) -> DecodedChar {
        let text = self
            .to_unicode
            .as_ref()
            .and_then(|map| map.lookup(code).map(str::to_string))
            .or_else(|| {
                if self.two_byte {
                    None
                } else {
                    self.encoding.get(code as usize).cloned().flatten()
                }
            })
            .unwrap_or_else(|| "\u{FFFD}".to_string());
        DecodedChar {
            code,
            text,
            width: self.width(code),
            is_space,
        }
    }

    /// Advance width of a code in 1/1000 text space units
    pub fn width(&self, code: u32) -> f32 {
        let width = match &self.widths {
            Widths::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize).copied()),
            Widths::Cid { widths, default } => Some(widths.get(&code).copied().unwrap_or(*default)),
            Widths::Missing => None,
        };
        match width {
            Some(w) => w * self.width_scale,
            None => match self.standard {
                Some(standard) if code < 256 => standard.width(code as u8) as f32,
                _ => DEFAULT_WIDTH,
            },
        }
    }
}

fn win_ansi_table() -> Vec<Option<String>> {
    (0..=255u8).map(|b| win_ansi_to_unicode(b).map(String::from)).collect()
}

/// Code to text table for a simple font's `/Encoding`
fn simple_encoding(doc: &Document, encoding: &Object) -> Vec<Option<String>> {
    let mut table = win_ansi_table();
    let Some(dict) = resolve_dict(doc, encoding) else {
        return table;
    };
    let Ok(Object::Array(differences)) = dict.get(b"Differences").map(|d| resolve(doc, d)) else {
        return table;
    };
    let mut code = 0usize;
    for item in differences {
        match item {
            Object::Integer(i) => code = (*i).max(0) as usize,
            Object::Name(name) => {
                if code < table.len() {
                    let name = String::from_utf8_lossy(name);
                    table[code] = glyph_name_to_unicode(&name);
                }
                code += 1;
            }
            _ => {}
        }
    }
    table
}

/// `/W` and `/DW` of a CID font
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> Widths {
    let default = cid_font
        .get(b"DW")
        .ok()
        .and_then(|o| as_number(doc, o))
        .unwrap_or(1000.0);
    let mut widths = HashMap::new();
    let items = match cid_font.get(b"W").map(|w| resolve(doc, w)) {
        Ok(Object::Array(arr)) => arr.as_slice(),
        _ => &[],
    };

    // Either `c [w1 w2 ...]` or `c_first c_last w`
    let mut i = 0;
    while i < items.len() {
        let Some(first) = as_number(doc, &items[i]) else { break };
        let first = first as u32;
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().filter_map(|o| as_number(doc, o)).enumerate() {
                    widths.insert(first + offset as u32, w);
                }
                i += 2;
            }
            Some(last) => {
                let last = as_number(doc, last).unwrap_or(first as f32) as u32;
                let w = items.get(i + 2).and_then(|o| as_number(doc, o)).unwrap_or(default);
                for cid in first..=last.max(first).min(first + 0xFFFF) {
                    widths.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    Widths::Cid { widths, default }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_standard_font_without_widths() {
        let doc = Document::with_version("1.5");
        let font = DocFont::load(&doc, &dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica",
        });
        let chars = font.decode(b"Hi ");
        assert_eq!(chars.len(), 3);
        assert_eq!(chars[0].text, "H");
        assert_eq!(chars[0].width, 722.0);
        assert!(chars[2].is_space);
        assert_eq!(font.ascent, 718.0);
    }

    #[test]
    fn test_widths_and_differences() {
        let doc = Document::with_version("1.5");
        let font = DocFont::load(&doc, &dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ABCDEF+Custom",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 610.into()],
            "Encoding" => dictionary! {
                "Differences" => vec![65.into(), Object::Name(b"quoteright".to_vec()), Object::Name(b"fi".to_vec())],
            },
        });
        let chars = font.decode(b"ABC");
        assert_eq!(chars[0].text, "\u{2019}");
        assert_eq!(chars[1].text, "fi");
        assert_eq!(chars[2].text, "C");
        assert_eq!(chars[0].width, 600.0);
        assert_eq!(chars[1].width, 610.0);
        assert_eq!(chars[2].width, DEFAULT_WIDTH);
    }

    #[test]
    fn test_type0_with_to_unicode_and_w() {
        let mut doc = Document::with_version("1.5");
        let cmap = doc.add_object(Stream::new(
            Dictionary::new(),
            b"beginbfchar\n<0024> <0041>\nendbfchar".to_vec(),
        ));
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 900,
            "W" => vec![
                Object::Integer(36),
                Object::Array(vec![Object::Integer(650)]),
                Object::Integer(40),
                Object::Integer(42),
                Object::Integer(300),
            ],
        });
        let font = DocFont::load(&doc, &dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Foo",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![cid_font.into()],
            "ToUnicode" => cmap,
        });
        let chars = font.decode(&[0x00, 0x24, 0x00, 0x29, 0x00, 0x50]);
        assert_eq!(chars.len(), 3);
        assert_eq!(chars[0].text, "A");
        assert_eq!(chars[0].width, 650.0);
        assert_eq!(chars[1].width, 300.0);
        assert_eq!(chars[2].width, 900.0);
        assert_eq!(chars[2].text, "\u{FFFD}");
        assert!(!chars[0].is_space);
    }
}
