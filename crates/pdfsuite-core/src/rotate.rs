//! Page rotation
//!
//! Rotation is stored in the page's `/Rotate` entry, so nothing in the
//! content stream changes. The angle is added to whatever rotation the page
//! already has (possibly inherited).

use crate::error::PdfSuiteError;
use crate::page_tree::{load, page_dict_mut, page_ids, rotation, save, PageTarget};
use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateSpec {
    /// Clockwise, any multiple of 90 (negative turns counter-clockwise).
    pub degrees: i64,
    #[serde(default)]
    pub pages: PageTarget,
}

pub(crate) fn check_degrees(degrees: i64) -> Result<(), PdfSuiteError> {
    if degrees % 90 != 0 {
        return Err(PdfSuiteError::InvalidInput(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            degrees
        )));
    }
    Ok(())
}

/// Add `degrees` to the page's effective rotation.
pub(crate) fn apply_rotation(
    doc: &mut Document,
    page_id: ObjectId,
    degrees: i64,
) -> Result<(), PdfSuiteError> {
    check_degrees(degrees)?;
    let updated = (rotation(doc, page_id) + degrees).rem_euclid(360);
    page_dict_mut(doc, page_id)?.set("Rotate", Object::Integer(updated));
    Ok(())
}

pub fn rotate_pages(bytes: &[u8], spec: &RotateSpec) -> Result<Vec<u8>, PdfSuiteError> {
    check_degrees(spec.degrees)?;
    let mut doc = load(bytes)?;
    let ids = page_ids(&doc);
    let targets = spec.pages.indices(ids.len())?;

    for &index in &targets {
        apply_rotation(&mut doc, ids[index], spec.degrees)?;
    }

    tracing::debug!(pages = targets.len(), degrees = spec.degrees, "rotated pages");
    save(doc)
}
