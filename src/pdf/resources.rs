//! Page resources and content stream plumbing
//!
//! Helpers for reading a page's `/Resources` and `/Contents` and for adding
//! our own fonts, graphics states and content streams to a page.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use crate::error::Result;

/// Follow a reference to the object it points at
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Resolve an object that should be a dictionary
pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Read a number (integer or real) from an object
pub fn as_number(doc: &Document, obj: &Object) -> Option<f32> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Read an array of numbers, skipping anything that is not a number
pub fn as_numbers(doc: &Document, obj: &Object) -> Vec<f32> {
    match resolve(doc, obj) {
        Object::Array(arr) => arr.iter().filter_map(|o| as_number(doc, o)).collect(),
        _ => Vec::new(),
    }
}

/// Get the resources dictionary that applies to a page
///
/// `/Resources` may be direct, a reference, or inherited from an ancestor
/// in the page tree.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut current = doc.get_dictionary(page_id)?;
    // Bounded walk up the page tree
    for _ in 0..64 {
        if let Ok(res) = current.get(b"Resources") {
            return Ok(resolve_dict(doc, res).cloned().unwrap_or_else(Dictionary::new));
        }
        match current.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = doc.get_dictionary(*parent_id)?,
            _ => break,
        }
    }
    Ok(Dictionary::new())
}

/// Get a resource category (`Font`, `XObject`, ...) from a resources dictionary
pub fn resource_category<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    category: &[u8],
) -> Option<&'a Dictionary> {
    resources.get(category).ok().and_then(|obj| resolve_dict(doc, obj))
}

/// Object IDs of the page's content streams, in drawing order
pub fn page_content_ids(doc: &Document, page_id: ObjectId) -> Result<Vec<ObjectId>> {
    let page_dict = doc.get_dictionary(page_id)?;
    let ids = match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of streams
            Ok(Object::Array(arr)) => references(arr),
            _ => vec![*id],
        },
        Ok(Object::Array(arr)) => references(arr),
        _ => vec![],
    };
    Ok(ids)
}

fn references(arr: &[Object]) -> Vec<ObjectId> {
    arr.iter()
        .filter_map(|o| if let Object::Reference(id) = o { Some(*id) } else { None })
        .collect()
}

/// The decoded bytes of a stream
pub fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

/// Decoded and concatenated content of all of a page's content streams
pub fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    for id in page_content_ids(doc, page_id)? {
        if let Ok(Object::Stream(stream)) = doc.get_object(id) {
            content.extend(stream_bytes(stream)?);
            content.push(b'\n');
        }
    }
    Ok(content)
}

/// Add an entry to a page's resources under a name that is not yet used
///
/// The page gets its own direct copy of the resources dictionary, so inherited
/// or shared resources are never modified for other pages.
///
/// Returns the resource name that was chosen.
pub fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    prefix: &str,
    object_id: ObjectId,
) -> Result<String> {
    let mut resources = page_resources(doc, page_id)?;

    let mut entries = match resources.get(category.as_bytes()) {
        Ok(obj) => resolve_dict(doc, obj).cloned().unwrap_or_else(Dictionary::new),
        Err(_) => Dictionary::new(),
    };

    let mut n = 0;
    let name = loop {
        let candidate = format!("{}{}", prefix, n);
        if !entries.has(candidate.as_bytes()) {
            break candidate;
        }
        n += 1;
    };

    entries.set(name.as_bytes().to_vec(), Object::Reference(object_id));
    resources.set(category, Object::Dictionary(entries));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok(name)
}

/// Append a content stream to a page's Contents
///
/// We append our content after the original content so the re-drawn text is
/// on top (not covered by background fills).
pub fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents: Vec<Object> = page_content_ids(doc, page_id)?
        .into_iter()
        .map(Object::Reference)
        .collect();
    contents.push(Object::Reference(new_content_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));
    Ok(())
}

/// Prepend a content stream to a page's Contents
pub fn prepend_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents: Vec<Object> = vec![Object::Reference(new_content_id)];
    contents.extend(
        page_content_ids(doc, page_id)?
            .into_iter()
            .map(Object::Reference),
    );

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));
    Ok(())
}

/// Wrap page content streams in q/Q to isolate transformations
///
/// Original content may leave a `cm` in effect at its end. Wrapping it means
/// any stream appended afterwards starts from the default page coordinates.
pub fn isolate_page_content(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    if page_content_ids(doc, page_id)?.is_empty() {
        return Ok(());
    }
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    prepend_content_to_page(doc, page_id, save_id)?;
    append_content_to_page(doc, page_id, restore_id)?;
    Ok(())
}
