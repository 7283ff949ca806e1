//! Page cropping
//!
//! Margins are trimmed from the page's visible box and written as its
//! `/CropBox`. The media box is left alone so the crop can be undone.

use crate::error::PdfSuiteError;
use crate::page_tree::{load, page_dict_mut, page_ids, rect_object, save, visible_box, PageTarget};
use serde::{Deserialize, Serialize};

/// Margins in points, measured inward from each edge of the visible box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CropMargins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl CropMargins {
    pub fn uniform(margin: f64) -> Self {
        Self {
            top: margin,
            right: margin,
            bottom: margin,
            left: margin,
        }
    }

    fn validate(&self) -> Result<(), PdfSuiteError> {
        let values = [self.top, self.right, self.bottom, self.left];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PdfSuiteError::InvalidInput(
                "Crop margins must be zero or positive".into(),
            ));
        }
        Ok(())
    }

    /// Shrink `rect` (`[x0, y0, x1, y1]`), or None if nothing would remain.
    pub fn apply(&self, rect: [f64; 4]) -> Option<[f64; 4]> {
        let cropped = [
            rect[0] + self.left,
            rect[1] + self.bottom,
            rect[2] - self.right,
            rect[3] - self.top,
        ];
        if cropped[2] > cropped[0] && cropped[3] > cropped[1] {
            Some(cropped)
        } else {
            None
        }
    }
}

pub fn crop_pages(
    bytes: &[u8],
    margins: &CropMargins,
    pages: &PageTarget,
) -> Result<Vec<u8>, PdfSuiteError> {
    margins.validate()?;
    let mut doc = load(bytes)?;
    let ids = page_ids(&doc);
    let targets = pages.indices(ids.len())?;

    for &index in &targets {
        let page_id = ids[index];
        let cropped = margins.apply(visible_box(&doc, page_id)).ok_or_else(|| {
            PdfSuiteError::InvalidInput(format!(
                "Crop margins are larger than page {}",
                index + 1
            ))
        })?;
        page_dict_mut(&mut doc, page_id)?.set("CropBox", rect_object(cropped));
    }

    tracing::debug!(pages = targets.len(), ?margins, "cropped pages");
    save(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_tree::test_support::{create_sized_pdf, create_test_pdf};
    use crate::page_tree::media_box;
    use lopdf::Document;

    #[test]
    fn test_apply_margins() {
        let margins = CropMargins {
            top: 10.0,
            right: 20.0,
            bottom: 30.0,
            left: 40.0,
        };
        assert_eq!(
            margins.apply([0.0, 0.0, 600.0, 800.0]),
            Some([40.0, 30.0, 580.0, 790.0])
        );
        assert_eq!(CropMargins::uniform(300.0).apply([0.0, 0.0, 600.0, 800.0]), None);
    }

    #[test]
    fn test_crop_sets_crop_box_only() {
        let pdf = create_sized_pdf(2, 600, 800);
        let result = crop_pages(&pdf, &CropMargins::uniform(50.0), &PageTarget::All).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        for id in page_ids(&doc) {
            assert_eq!(visible_box(&doc, id), [50.0, 50.0, 550.0, 750.0]);
            assert_eq!(media_box(&doc, id), [0.0, 0.0, 600.0, 800.0]);
        }
    }

    #[test]
    fn test_crop_is_relative_to_existing_crop() {
        let pdf = create_sized_pdf(1, 600, 800);
        let once = crop_pages(&pdf, &CropMargins::uniform(50.0), &PageTarget::All).unwrap();
        let twice = crop_pages(&once, &CropMargins::uniform(50.0), &PageTarget::All).unwrap();
        let doc = Document::load_mem(&twice).unwrap();
        let id = page_ids(&doc)[0];
        assert_eq!(visible_box(&doc, id), [100.0, 100.0, 500.0, 700.0]);
    }

    #[test]
    fn test_crop_only_selected_pages() {
        let pdf = create_test_pdf(3);
        let result =
            crop_pages(&pdf, &CropMargins::uniform(10.0), &PageTarget::Only(vec![1])).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        let ids = page_ids(&doc);
        assert_eq!(visible_box(&doc, ids[0]), [0.0, 0.0, 612.0, 792.0]);
        assert_eq!(visible_box(&doc, ids[1]), [10.0, 10.0, 602.0, 782.0]);
    }

    #[test]
    fn test_oversized_margins_rejected() {
        let pdf = create_test_pdf(1);
        let err = crop_pages(&pdf, &CropMargins::uniform(400.0), &PageTarget::All).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_negative_margins_rejected() {
        let pdf = create_test_pdf(1);
        let margins = CropMargins {
            left: -5.0,
            ..Default::default()
        };
        assert!(crop_pages(&pdf, &margins, &PageTarget::All).is_err());
    }
}
