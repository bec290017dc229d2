//! Which fonts a page uses, and which of them must be replaced
//!
//! Fonts are found in the page's own resources and in the resources of every
//! Form XObject the page draws. Each font is attributed to the content stream
//! that selects it: the page `/Contents`, or the XObject's stream.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use log::debug;

use super::resources::{page_resources, resolve_dict, resource_category};
use crate::error::Result;
use crate::fonts::ReplacementFont;

/// The content stream(s) a font resource name is used from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamOwner {
    /// The page's own `/Contents` streams
    Page,
    /// A Form XObject stream
    XObject(ObjectId),
}

/// A font resource as seen from a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageFont {
    /// Resource name, e.g. `F1`
    pub resource: String,
    /// `/BaseFont`, including any subset tag
    pub base_font: String,
    /// `/Subtype`, e.g. `TrueType`
    pub subtype: String,
    /// Where the resource name is used
    pub owner: StreamOwner,
    /// Object ID of the font dictionary, when it is indirect
    pub font_id: Option<ObjectId>,
}

/// Reference names of fonts to remove, grouped by content stream owner
///
/// Each reference is stored the way it appears in a content stream line:
/// a slash, the resource name and a trailing space (`b"/F1 "`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontRefs {
    refs: BTreeMap<StreamOwner, Vec<Vec<u8>>>,
}

impl FontRefs {
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn insert(&mut self, owner: StreamOwner, resource: &str) {
        let reference = format!("/{} ", resource).into_bytes();
        let list = self.refs.entry(owner).or_default();
        if !list.contains(&reference) {
            list.push(reference);
        }
    }

    /// Reference names for one owner
    pub fn get(&self, owner: &StreamOwner) -> Option<&[Vec<u8>]> {
        self.refs.get(owner).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StreamOwner, &Vec<Vec<u8>>)> {
        self.refs.iter()
    }
}

/// List every font resource reachable from a page
pub fn list_page_fonts(doc: &Document, page_id: ObjectId) -> Result<Vec<PageFont>> {
    let resources = page_resources(doc, page_id)?;
    let mut fonts = Vec::new();
    let mut visited = BTreeSet::new();
    collect_fonts(doc, &resources, StreamOwner::Page, &mut visited, &mut fonts);
    Ok(fonts)
}

fn collect_fonts(
    doc: &Document,
    resources: &Dictionary,
    owner: StreamOwner,
    visited: &mut BTreeSet<ObjectId>,
    out: &mut Vec<PageFont>,
) {
    if let Some(font_dict) = resource_category(doc, resources, b"Font") {
        for (name, value) in font_dict.iter() {
            let font_id = match value {
                Object::Reference(id) => Some(*id),
                _ => None,
            };
            let Some(font) = resolve_dict(doc, value) else { continue };
            out.push(PageFont {
                resource: String::from_utf8_lossy(name).into_owned(),
                base_font: name_entry(font, b"BaseFont"),
                subtype: name_entry(font, b"Subtype"),
                owner,
                font_id,
            });
        }
    }

    let Some(xobjects) = resource_category(doc, resources, b"XObject") else { return };
    for (_, value) in xobjects.iter() {
        let Object::Reference(xobject_id) = value else { continue };
        if !visited.insert(*xobject_id) {
            continue;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(*xobject_id) else { continue };
        let is_form = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form");
        if !is_form {
            continue;
        }
        // A form without its own resources uses the ones it is drawn with
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r))
            .unwrap_or(resources);
        collect_fonts(doc, form_resources, StreamOwner::XObject(*xobject_id), visited, out);
    }
}

fn name_entry(dict: &Dictionary, key: &[u8]) -> String {
    match dict.get(key) {
        Ok(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
        Ok(obj @ Object::String(..)) => obj
            .as_str()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Reference names of the fonts on a page that must be replaced
///
/// Every font whose base name (subset tag removed) differs from the
/// replacement font is to be replaced. An empty result means the page has
/// nothing to replace.
pub fn get_page_fontrefs(
    doc: &Document,
    page_id: ObjectId,
    replacement: &ReplacementFont,
) -> Result<FontRefs> {
    let mut refs = FontRefs::default();
    for font in list_page_fonts(doc, page_id)? {
        if replacement.matches_base_font(&font.base_font) {
            debug!("Font /{} is already {}, keeping it", font.resource, replacement.name());
            continue;
        }
        refs.insert(font.owner, &font.resource);
    }
    Ok(refs)
}
