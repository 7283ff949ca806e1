//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::error::PdfSuiteError;
use crate::page_tree::{page_ids, rebuild_page_tree, save};
use lopdf::{Document, Object};
use std::collections::BTreeMap;

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is
/// 3. Use the first document as the destination
/// 4. For each other document:
///    a. Calculate ID offset to avoid conflicts
///    b. Import all objects with remapped IDs
///    c. Append pages to the destination
/// 5. Rebuild a flat page tree, prune the other catalogs and save
pub fn merge_documents(mut documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfSuiteError> {
    if documents.is_empty() {
        return Err(PdfSuiteError::InvalidInput("No documents to merge".into()));
    }

    // Load all documents first
    let mut loaded_docs = Vec::new();
    for (i, doc_bytes) in documents.iter().enumerate() {
        let doc = Document::load_mem(doc_bytes).map_err(|e| {
            PdfSuiteError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        loaded_docs.push(doc);
    }

    // Single document - return as-is
    if documents.len() == 1 {
        return Ok(documents.remove(0));
    }

    // Start with the first document as the base
    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = page_ids(&dest);

    for source in loaded_docs.into_iter() {
        // Get source pages before we start modifying the document
        let source_pages = page_ids(&source);

        // Calculate offset for object IDs to avoid conflicts
        let id_offset = dest_max_id;

        let mut remapped_objects = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            remapped_objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest.objects.extend(remapped_objects);

        for old_page_ref in source_pages {
            dest_page_refs.push((old_page_ref.0 + id_offset, old_page_ref.1));
        }

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;

    // Pages keep the attributes they inherited in their own tree
    rebuild_page_tree(&mut dest, &dest_page_refs)?;

    tracing::debug!(
        documents = documents.len(),
        pages = dest_page_refs.len(),
        "merged documents"
    );
    save(dest)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}
