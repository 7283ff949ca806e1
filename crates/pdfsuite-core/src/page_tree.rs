//! Page tree helpers shared by the document operations
//!
//! Pages can inherit `Resources`, `MediaBox`, `CropBox` and `Rotate` from
//! their ancestors. Whenever a page leaves its original tree (extraction,
//! reordering, merging) those attributes are copied onto the page itself.

use crate::error::PdfSuiteError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;

pub(crate) const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when a page declares no box at all.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Which physical pages an operation touches.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "pages")]
pub enum PageTarget {
    #[default]
    All,
    /// 0-based physical page indices.
    Only(Vec<usize>),
}

impl PageTarget {
    /// Resolve to physical indices for a document with `page_count` pages.
    pub fn indices(&self, page_count: usize) -> Result<Vec<usize>, PdfSuiteError> {
        match self {
            PageTarget::All => Ok((0..page_count).collect()),
            PageTarget::Only(pages) => {
                if pages.is_empty() {
                    return Err(PdfSuiteError::InvalidInput("No pages selected".into()));
                }
                if let Some(&bad) = pages.iter().find(|&&p| p >= page_count) {
                    return Err(PdfSuiteError::InvalidInput(format!(
                        "Page {} does not exist (document has {} pages)",
                        bad + 1,
                        page_count
                    )));
                }
                Ok(pages.clone())
            }
        }
    }
}

pub(crate) fn load(bytes: &[u8]) -> Result<Document, PdfSuiteError> {
    Document::load_mem(bytes).map_err(|e| PdfSuiteError::ParseError(e.to_string()))
}

pub(crate) fn save(mut doc: Document) -> Result<Vec<u8>, PdfSuiteError> {
    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfSuiteError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Page object ids in document order.
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Follow references until a direct object is reached.
pub(crate) fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    // reference chains deeper than this are treated as broken
    for _ in 0..8 {
        match current {
            Object::Reference(id) => current = doc.objects.get(id)?,
            other => return Some(other),
        }
    }
    None
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Look up `key` on the page or the nearest ancestor that defines it.
pub(crate) fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    let mut visited = HashSet::new();
    visited.insert(page_id);
    loop {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        if !visited.insert(parent) {
            return None;
        }
        node = doc.get_dictionary(parent).ok()?;
    }
}

fn as_rect(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = deref(doc, obj)?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(arr) {
        *slot = number(deref(doc, value)?)?;
    }
    // normalise so that [0],[1] is the lower-left corner
    Some([
        rect[0].min(rect[2]),
        rect[1].min(rect[3]),
        rect[0].max(rect[2]),
        rect[1].max(rect[3]),
    ])
}

pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| as_rect(doc, &obj))
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// The visible area of the page: `CropBox` if present, else `MediaBox`.
pub(crate) fn visible_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    inherited(doc, page_id, b"CropBox")
        .and_then(|obj| as_rect(doc, &obj))
        .unwrap_or_else(|| media_box(doc, page_id))
}

/// Effective `/Rotate`, normalised to 0, 90, 180 or 270.
pub(crate) fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .and_then(|obj| deref(doc, &obj).and_then(number))
        .map(|r| (r as i64).rem_euclid(360))
        .unwrap_or(0)
}

pub(crate) fn rect_object(rect: [f64; 4]) -> Object {
    Object::Array(rect.iter().map(|&v| Object::Real(v as f32)).collect())
}

pub(crate) fn page_dict_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, PdfSuiteError> {
    match doc.get_object_mut(page_id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(PdfSuiteError::OperationError(format!(
            "Page {:?} is not a dictionary",
            page_id
        ))),
    }
}

/// Object id of the root `Pages` node.
pub(crate) fn pages_root_id(doc: &Document) -> Result<ObjectId, PdfSuiteError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfSuiteError::OperationError("No Root in trailer".into()))?;

    doc.get_dictionary(catalog_id)
        .map_err(|_| PdfSuiteError::OperationError("Catalog not found".into()))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| PdfSuiteError::OperationError("No Pages in catalog".into()))
}

/// Replace the page tree with a flat list of `pages`, in order.
///
/// Inherited attributes are copied onto each page first. A page listed more
/// than once is cloned so every leaf is a distinct object. Objects that are
/// no longer reachable are pruned.
pub(crate) fn rebuild_page_tree(
    doc: &mut Document,
    pages: &[ObjectId],
) -> Result<(), PdfSuiteError> {
    let root_id = pages_root_id(doc)?;

    // Collect the flattened dictionaries before touching any Parent links.
    let mut flattened = Vec::with_capacity(pages.len());
    for &page_id in pages {
        let mut dict = doc
            .get_dictionary(page_id)
            .map_err(|_| PdfSuiteError::OperationError(format!("Page {:?} not found", page_id)))?
            .clone();
        for key in INHERITABLE {
            if !dict.has(key) {
                if let Some(value) = inherited(doc, page_id, key) {
                    dict.set(key.to_vec(), value);
                }
            }
        }
        dict.set("Parent", Object::Reference(root_id));
        flattened.push((page_id, dict));
    }

    let mut placed = HashSet::new();
    let mut kids = Vec::with_capacity(flattened.len());
    for (page_id, dict) in flattened {
        let target = if placed.insert(page_id) {
            doc.objects.insert(page_id, Object::Dictionary(dict));
            page_id
        } else {
            doc.add_object(Object::Dictionary(dict))
        };
        kids.push(Object::Reference(target));
    }

    let count = kids.len() as i64;
    match doc.objects.get_mut(&root_id) {
        Some(Object::Dictionary(root)) => {
            root.set("Kids", Object::Array(kids));
            root.set("Count", Object::Integer(count));
        }
        _ => {
            return Err(PdfSuiteError::OperationError(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    doc.prune_objects();
    Ok(())
}

/// Register `object_id` under `category` (e.g. `Font`) in the page's own
/// resource dictionary and return the name it was given.
pub(crate) fn add_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    prefix: &str,
    object_id: ObjectId,
) -> Result<String, PdfSuiteError> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| deref(doc, &obj).and_then(|o| o.as_dict().ok()).cloned())
        .unwrap_or_default();

    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|obj| deref(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut n = 1;
    let name = loop {
        let candidate = format!("{}{}", prefix, n);
        if !entries.has(candidate.as_bytes()) {
            break candidate;
        }
        n += 1;
    };

    entries.set(name.clone(), Object::Reference(object_id));
    resources.set(category.to_vec(), Object::Dictionary(entries));
    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Draw `content` on top of the page.
///
/// The existing content is wrapped in `q`/`Q` so any graphics state it leaves
/// behind does not leak into the overlay.
pub(crate) fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), PdfSuiteError> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(arr)) => arr.clone(),
        _ => Vec::new(),
    };

    let mut overlay = b"Q\n".to_vec();
    overlay.extend_from_slice(&content);

    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_inherited_resources_found_on_parent() {
        let doc = load(&create_test_pdf(2)).unwrap();
        let ids = page_ids(&doc);
        assert!(doc.get_dictionary(ids[0]).unwrap().get(b"Resources").is_err());
        assert!(inherited(&doc, ids[0], b"Resources").is_some());
        assert!(inherited(&doc, ids[0], b"Rotate").is_none());
    }

    #[test]
    fn test_boxes_and_rotation_defaults() {
        let doc = load(&create_sized_pdf(1, 600, 800)).unwrap();
        let id = page_ids(&doc)[0];
        assert_eq!(media_box(&doc, id), [0.0, 0.0, 600.0, 800.0]);
        assert_eq!(visible_box(&doc, id), [0.0, 0.0, 600.0, 800.0]);
        assert_eq!(rotation(&doc, id), 0);
    }

    #[test]
    fn test_rebuild_reorders_and_flattens() {
        let mut doc = load(&create_test_pdf(3)).unwrap();
        let ids = page_ids(&doc);
        rebuild_page_tree(&mut doc, &[ids[2], ids[0]]).unwrap();
        let new_ids = page_ids(&doc);
        assert_eq!(new_ids, vec![ids[2], ids[0]]);
        // Resources moved from the old parent onto the page
        assert!(doc.get_dictionary(ids[2]).unwrap().has(b"Resources"));
        // Page 2 is gone
        assert!(doc.get_object(ids[1]).is_err());
    }

    #[test]
    fn test_rebuild_clones_repeated_pages() {
        let mut doc = load(&create_test_pdf(2)).unwrap();
        let ids = page_ids(&doc);
        rebuild_page_tree(&mut doc, &[ids[0], ids[0]]).unwrap();
        let new_ids = page_ids(&doc);
        assert_eq!(new_ids.len(), 2);
        assert_ne!(new_ids[0], new_ids[1]);
    }

    #[test]
    fn test_add_resource_picks_free_name() {
        let mut doc = load(&create_test_pdf(1)).unwrap();
        let id = page_ids(&doc)[0];
        let font_id = doc.add_object(dictionary! { "Type" => "Font" });
        let first = add_resource(&mut doc, id, b"Font", "F", font_id).unwrap();
        // F1 is taken by the inherited resources
        assert_eq!(first, "F2");
        let second = add_resource(&mut doc, id, b"Font", "F", font_id).unwrap();
        assert_eq!(second, "F3");
    }

    #[test]
    fn test_append_content_wraps_existing() {
        let mut doc = load(&create_test_pdf(1)).unwrap();
        let id = page_ids(&doc)[0];
        append_content(&mut doc, id, b"0 0 m\n".to_vec()).unwrap();
        let content = doc.get_page_content(id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.starts_with("q\n"));
        assert!(text.contains("Q\n0 0 m"));
    }

    #[test]
    fn test_page_target_bounds() {
        assert_eq!(PageTarget::All.indices(3).unwrap(), vec![0, 1, 2]);
        assert!(PageTarget::Only(vec![3]).indices(3).is_err());
        assert!(PageTarget::Only(vec![]).indices(3).is_err());
        assert_eq!(PageTarget::Only(vec![2, 0]).indices(3).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_labels_helper_reads_page_text() {
        assert_eq!(
            page_labels(&create_test_pdf(2)),
            vec!["Page 1".to_string(), "Page 2".to_string()]
        );
    }
}
