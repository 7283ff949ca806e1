//! PDF validation and info extraction
//!
//! Checks an uploaded file before any transform runs, and reports what the
//! page list needs to show.

use crate::error::PdfSuiteError;
use crate::page_tree::{load, page_ids, rotation, visible_box};
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;

/// PDF file information extracted during validation
#[derive(Debug, Clone, Serialize, Default)]
pub struct PdfInfo {
    pub page_count: usize,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// Encrypted files load, but transforms may fail on them
    pub encrypted: bool,
    pub size_bytes: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Validate a PDF file and extract basic info
pub fn validate_pdf(bytes: &[u8]) -> Result<PdfInfo, PdfSuiteError> {
    check_header(bytes)?;
    let version = extract_version(bytes);
    let document = load(bytes)?;

    let page_count = document.get_pages().len();
    if page_count == 0 {
        return Err(PdfSuiteError::InvalidInput("PDF has no pages".into()));
    }

    let encrypted = document.is_encrypted();
    if encrypted {
        tracing::warn!("document is encrypted; transforms may fail");
    }

    Ok(PdfInfo {
        page_count,
        version,
        encrypted,
        size_bytes: bytes.len(),
        title: info_string(&document, b"Title"),
        author: info_string(&document, b"Author"),
    })
}

pub fn get_page_count(bytes: &[u8]) -> Result<usize, PdfSuiteError> {
    Ok(load(bytes)?.get_pages().len())
}

fn check_header(bytes: &[u8]) -> Result<(), PdfSuiteError> {
    if bytes.len() < 8 {
        return Err(PdfSuiteError::InvalidInput(
            "File too small to be a valid PDF".into(),
        ));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(PdfSuiteError::InvalidInput(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }
    Ok(())
}

/// Header format: %PDF-1.7
fn extract_version(bytes: &[u8]) -> String {
    bytes
        .get(5..8)
        .and_then(|v| std::str::from_utf8(v).ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "1.4".to_string())
}

fn info_string(document: &Document, key: &[u8]) -> Option<String> {
    let info_id = document.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = document.get_dictionary(info_id).ok()?;
    let value = info.get(key).ok()?.as_str().ok()?;
    let decoded = decode_text_string(value);
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Text strings are either UTF-16BE with a BOM or PDFDocEncoding, which is
/// close enough to Latin-1 for metadata display.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Quick validation without full parsing (for large files)
pub fn quick_validate(bytes: &[u8]) -> Result<(), PdfSuiteError> {
    check_header(bytes)?;

    let tail = if bytes.len() > 1024 {
        &bytes[bytes.len() - 1024..]
    } else {
        bytes
    };

    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(PdfSuiteError::InvalidInput(
            "PDF appears truncated (missing %%EOF marker)".into(),
        ));
    }

    Ok(())
}

/// Information about a single PDF page
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    /// Page number (1-indexed)
    pub page_num: usize,
    /// Visible width in points, before rotation
    pub width: f64,
    pub height: f64,
    /// 0, 90, 180 or 270
    pub rotation: i64,
    pub has_content: bool,
    /// Orientation as displayed, i.e. after rotation
    pub orientation: PageOrientation,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

impl PageInfo {
    fn for_page(doc: &Document, page_num: usize, page_id: ObjectId) -> Self {
        let rect = visible_box(doc, page_id);
        let (width, height) = (rect[2] - rect[0], rect[3] - rect[1]);
        let rotation = rotation(doc, page_id);

        let (shown_w, shown_h) = if rotation == 90 || rotation == 270 {
            (height, width)
        } else {
            (width, height)
        };
        let orientation = if (shown_w - shown_h).abs() < 1.0 {
            PageOrientation::Square
        } else if shown_w > shown_h {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        };

        let has_content = doc
            .get_dictionary(page_id)
            .map(|dict| match dict.get(b"Contents") {
                Ok(Object::Array(parts)) => !parts.is_empty(),
                Ok(_) => true,
                Err(_) => false,
            })
            .unwrap_or(false);

        Self {
            page_num,
            width,
            height,
            rotation,
            has_content,
            orientation,
        }
    }

    /// Info for page `page_num` (1-indexed)
    pub fn from_document(doc: &Document, page_num: usize) -> Result<Self, PdfSuiteError> {
        let page_id = page_num
            .checked_sub(1)
            .and_then(|i| page_ids(doc).get(i).copied())
            .ok_or_else(|| PdfSuiteError::InvalidInput(format!("Page {} not found", page_num)))?;
        Ok(Self::for_page(doc, page_num, page_id))
    }

    pub fn all_from_document(doc: &Document) -> Vec<Self> {
        page_ids(doc)
            .into_iter()
            .enumerate()
            .map(|(i, id)| Self::for_page(doc, i + 1, id))
            .collect()
    }
}

/// Page infos straight from file bytes.
pub fn page_infos(bytes: &[u8]) -> Result<Vec<PageInfo>, PdfSuiteError> {
    Ok(PageInfo::all_from_document(&load(bytes)?))
}
