//! Output naming and packaging
//!
//! A transform produces either one document or several. Several are bundled
//! into a zip archive so the user gets a single download either way.

use crate::error::PdfSuiteError;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PDF_MIME: &str = "application/pdf";
pub const ZIP_MIME: &str = "application/zip";
pub const PNG_MIME: &str = "image/png";

/// Suffix appended to the input's stem, one per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSuffix {
    Page(usize),
    Part(usize),
    Split,
    Extracted,
    Edited,
    Rotated,
    Cropped,
    Watermarked,
    Images,
    Image(usize),
}

impl OutputSuffix {
    fn as_str(&self) -> String {
        match self {
            OutputSuffix::Page(n) => format!("page-{}", n),
            OutputSuffix::Part(n) => format!("part-{}", n),
            OutputSuffix::Split => "split".into(),
            OutputSuffix::Extracted => "extracted".into(),
            OutputSuffix::Edited => "edited".into(),
            OutputSuffix::Rotated => "rotated".into(),
            OutputSuffix::Cropped => "cropped".into(),
            OutputSuffix::Watermarked => "watermarked".into(),
            OutputSuffix::Images => "images".into(),
            OutputSuffix::Image(n) => n.to_string(),
        }
    }
}

/// Strip a trailing `.pdf` (any case) and any directory part.
pub fn file_stem(file_name: &str) -> &str {
    let base = file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);
    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => {
            &base[..cut]
        }
        _ => base,
    };
    if stem.is_empty() {
        "document"
    } else {
        stem
    }
}

/// `report.pdf` + `Part(2)` + `pdf` -> `report-part-2.pdf`
pub fn output_name(input: &str, suffix: &OutputSuffix, extension: &str) -> String {
    format!("{}-{}.{}", file_stem(input), suffix.as_str(), extension)
}

/// A file ready to be written or packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// What the user downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    #[serde(with = "serde_bytes_base64")]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputBundle {
    Single(OutputFile),
    Archive {
        file_name: String,
        entries: Vec<OutputFile>,
    },
}

impl OutputBundle {
    pub fn file_count(&self) -> usize {
        match self {
            OutputBundle::Single(_) => 1,
            OutputBundle::Archive { entries, .. } => entries.len(),
        }
    }

    /// Collapse into one download, zipping when there are several files.
    pub fn into_download(self) -> Result<Download, PdfSuiteError> {
        match self {
            OutputBundle::Single(file) => Ok(Download {
                mime_type: mime_for(&file.file_name).to_string(),
                file_name: file.file_name,
                bytes: file.bytes,
            }),
            OutputBundle::Archive { file_name, entries } => {
                let bytes = zip_files(&entries)?;
                tracing::debug!(
                    archive = %file_name,
                    entries = entries.len(),
                    size = bytes.len(),
                    "packed archive"
                );
                Ok(Download {
                    file_name,
                    mime_type: ZIP_MIME.to_string(),
                    bytes,
                })
            }
        }
    }

    /// The individual files, without packing.
    pub fn into_files(self) -> Vec<OutputFile> {
        match self {
            OutputBundle::Single(file) => vec![file],
            OutputBundle::Archive { entries, .. } => entries,
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        ZIP_MIME
    } else if lower.ends_with(".png") {
        PNG_MIME
    } else {
        PDF_MIME
    }
}

/// Deflate every entry into a single zip archive.
pub fn zip_files(entries: &[OutputFile]) -> Result<Vec<u8>, PdfSuiteError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer.start_file(entry.file_name.as_str(), options)?;
        writer
            .write_all(&entry.bytes)
            .map_err(|e| PdfSuiteError::ArchiveError(e.to_string()))?;
    }

    Ok(writer.finish()?.into_inner())
}

mod serde_bytes_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
