//! JSON command interface
//!
//! One entry point for hosts that talk in serialized messages: a command in,
//! a [`ProcessResult`] with base64 data out.

use crate::crop::{crop_pages, CropMargins};
use crate::error::PdfSuiteError;
use crate::fonts::FontSource;
use crate::inspect::get_page_count;
use crate::merge::merge_documents;
use crate::output::{output_name, Download, OutputBundle, OutputFile, OutputSuffix};
use crate::page_tree::PageTarget;
use crate::render::{export_images, ImageExportOptions, PageRasterizer};
use crate::rotate::{rotate_pages, RotateSpec};
use crate::selection::{DocumentView, SelectionMode};
use crate::split::{apply_selection, edit_document};
use crate::watermark::{watermark_image, watermark_text, ImageWatermark, TextWatermark};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_file_name() -> String {
    "document.pdf".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PdfCommand {
    Split {
        file: Vec<u8>,
        #[serde(default = "default_file_name")]
        file_name: String,
        /// Physical page order as shown; the whole document when absent
        #[serde(default)]
        view: Option<Vec<usize>>,
        selection: SelectionMode,
    },
    Merge {
        files: Vec<Vec<u8>>,
    },
    Rotate {
        file: Vec<u8>,
        #[serde(default = "default_file_name")]
        file_name: String,
        spec: RotateSpec,
    },
    Crop {
        file: Vec<u8>,
        #[serde(default = "default_file_name")]
        file_name: String,
        margins: CropMargins,
        #[serde(default)]
        pages: PageTarget,
    },
    Watermark {
        file: Vec<u8>,
        #[serde(default = "default_file_name")]
        file_name: String,
        watermark: TextWatermark,
    },
    ImageWatermark {
        file: Vec<u8>,
        #[serde(default = "default_file_name")]
        file_name: String,
        image: Vec<u8>,
        watermark: ImageWatermark,
    },
    Edit {
        file: Vec<u8>,
        #[serde(default = "default_file_name")]
        file_name: String,
        view: Vec<usize>,
        #[serde(default)]
        rotations: BTreeMap<usize, i64>,
    },
    ExportImages {
        file: Vec<u8>,
        #[serde(default = "default_file_name")]
        file_name: String,
        #[serde(default)]
        options: ImageExportOptions,
    },
}

impl PdfCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PdfCommand::Split { .. } => "split",
            PdfCommand::Merge { .. } => "merge",
            PdfCommand::Rotate { .. } => "rotate",
            PdfCommand::Crop { .. } => "crop",
            PdfCommand::Watermark { .. } => "watermark",
            PdfCommand::ImageWatermark { .. } => "image_watermark",
            PdfCommand::Edit { .. } => "edit",
            PdfCommand::ExportImages { .. } => "export_images",
        }
    }

    fn input_size(&self) -> usize {
        match self {
            PdfCommand::Merge { files } => files.iter().map(Vec::len).sum(),
            PdfCommand::Split { file, .. }
            | PdfCommand::Rotate { file, .. }
            | PdfCommand::Crop { file, .. }
            | PdfCommand::Watermark { file, .. }
            | PdfCommand::ImageWatermark { file, .. }
            | PdfCommand::Edit { file, .. }
            | PdfCommand::ExportImages { file, .. } => file.len(),
        }
    }

    fn input_pages(&self) -> usize {
        match self {
            PdfCommand::Merge { files } => files
                .iter()
                .filter_map(|f| get_page_count(f).ok())
                .sum(),
            PdfCommand::Split { file, .. }
            | PdfCommand::Rotate { file, .. }
            | PdfCommand::Crop { file, .. }
            | PdfCommand::Watermark { file, .. }
            | PdfCommand::ImageWatermark { file, .. }
            | PdfCommand::Edit { file, .. }
            | PdfCommand::ExportImages { file, .. } => get_page_count(file).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Base64-encoded output
    pub data: Option<String>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
}

impl ProcessResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            file_name: None,
            mime_type: None,
            data: None,
            error: Some(error.into()),
            metrics: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: usize,
    pub output_files: usize,
    pub processing_time_ms: u64,
}

fn single(file_name: String, bytes: Vec<u8>) -> OutputBundle {
    OutputBundle::Single(OutputFile { file_name, bytes })
}

/// Run a command and return its output bundle.
pub fn run_command(
    command: &PdfCommand,
    fonts: &dyn FontSource,
    rasterizer: &dyn PageRasterizer,
) -> Result<OutputBundle, PdfSuiteError> {
    match command {
        PdfCommand::Split {
            file,
            file_name,
            view,
            selection,
        } => {
            let page_count = get_page_count(file)?;
            let view = match view {
                Some(pages) => DocumentView::new(pages.clone(), page_count)?,
                None => DocumentView::identity(page_count),
            };
            apply_selection(file, file_name, &view, selection)
        }
        PdfCommand::Merge { files } => Ok(single(
            "merged.pdf".to_string(),
            merge_documents(files.clone())?,
        )),
        PdfCommand::Rotate {
            file,
            file_name,
            spec,
        } => Ok(single(
            output_name(file_name, &OutputSuffix::Rotated, "pdf"),
            rotate_pages(file, spec)?,
        )),
        PdfCommand::Crop {
            file,
            file_name,
            margins,
            pages,
        } => Ok(single(
            output_name(file_name, &OutputSuffix::Cropped, "pdf"),
            crop_pages(file, margins, pages)?,
        )),
        PdfCommand::Watermark {
            file,
            file_name,
            watermark,
        } => Ok(single(
            output_name(file_name, &OutputSuffix::Watermarked, "pdf"),
            watermark_text(file, watermark, fonts)?,
        )),
        PdfCommand::ImageWatermark {
            file,
            file_name,
            image,
            watermark,
        } => Ok(single(
            output_name(file_name, &OutputSuffix::Watermarked, "pdf"),
            watermark_image(file, image, watermark)?,
        )),
        PdfCommand::Edit {
            file,
            file_name,
            view,
            rotations,
        } => {
            let view = DocumentView::new(view.clone(), get_page_count(file)?)?;
            Ok(single(
                output_name(file_name, &OutputSuffix::Edited, "pdf"),
                edit_document(file, &view, rotations)?,
            ))
        }
        PdfCommand::ExportImages {
            file,
            file_name,
            options,
        } => export_images(file, file_name, options, rasterizer),
    }
}

#[cfg(not(target_arch = "wasm32"))]
struct Stopwatch(std::time::Instant);

#[cfg(not(target_arch = "wasm32"))]
impl Stopwatch {
    fn start() -> Self {
        Self(std::time::Instant::now())
    }

    fn elapsed_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

// std::time::Instant is unavailable on wasm32-unknown-unknown; the browser
// host measures time itself.
#[cfg(target_arch = "wasm32")]
struct Stopwatch;

#[cfg(target_arch = "wasm32")]
impl Stopwatch {
    fn start() -> Self {
        Self
    }

    fn elapsed_ms(&self) -> u64 {
        0
    }
}

/// Run a command and report the outcome without failing.
pub fn process_command(
    command: &PdfCommand,
    fonts: &dyn FontSource,
    rasterizer: &dyn PageRasterizer,
) -> ProcessResult {
    let watch = Stopwatch::start();
    let outcome = run_command(command, fonts, rasterizer).and_then(|bundle| {
        let files = bundle.file_count();
        bundle.into_download().map(|download| (download, files))
    });

    match outcome {
        Ok((download, output_files)) => {
            let Download {
                file_name,
                mime_type,
                bytes,
            } = download;
            let metrics = ProcessMetrics {
                input_size_bytes: command.input_size(),
                output_size_bytes: bytes.len(),
                page_count: command.input_pages(),
                output_files,
                processing_time_ms: watch.elapsed_ms(),
            };
            tracing::info!(
                command = command.name(),
                output = %file_name,
                size = bytes.len(),
                "command completed"
            );
            ProcessResult {
                success: true,
                file_name: Some(file_name),
                mime_type: Some(mime_type),
                data: Some(STANDARD.encode(&bytes)),
                error: None,
                metrics: Some(metrics),
            }
        }
        Err(e) => {
            tracing::error!(command = command.name(), error = %e, "command failed");
            ProcessResult::failure(e.user_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::NoFontSource;
    use crate::page_tree::test_support::{create_test_pdf, page_labels};
    use crate::render::HayroRasterizer;

    fn run(command: PdfCommand) -> ProcessResult {
        process_command(&command, &NoFontSource, &HayroRasterizer)
    }

    fn decoded(result: &ProcessResult) -> Vec<u8> {
        STANDARD.decode(result.data.as_ref().unwrap()).unwrap()
    }

    #[test]
    fn test_command_deserializes_merge() {
        let json = r#"{"type":"Merge","files":[]}"#;
        let cmd: PdfCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, PdfCommand::Merge { .. }));
    }

    #[test]
    fn test_command_deserializes_split() {
        let json = r#"{"type":"Split","file":[],"selection":{"mode":"ranges","value":"1-3, 5"}}"#;
        let cmd: PdfCommand = serde_json::from_str(json).unwrap();
        match cmd {
            PdfCommand::Split {
                file_name,
                view,
                selection,
                ..
            } => {
                assert_eq!(file_name, "document.pdf");
                assert_eq!(view, None);
                assert_eq!(selection, SelectionMode::Ranges("1-3, 5".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_command_deserializes_watermark_with_defaults() {
        let json = r#"{"type":"Watermark","file":[],"watermark":{"text":"DRAFT"}}"#;
        let cmd: PdfCommand = serde_json::from_str(json).unwrap();
        let PdfCommand::Watermark { watermark, .. } = cmd else {
            panic!("expected watermark");
        };
        assert_eq!(watermark.text, "DRAFT");
        assert_eq!(watermark.font_size, 48.0);
        assert_eq!(watermark.pages, PageTarget::All);
    }

    #[test]
    fn test_process_extract() {
        let result = run(PdfCommand::Split {
            file: create_test_pdf(4),
            file_name: "deck.pdf".into(),
            view: None,
            selection: SelectionMode::Extract(vec![3, 1]),
        });
        assert!(result.success);
        assert_eq!(result.file_name.as_deref(), Some("deck-extracted.pdf"));
        assert_eq!(page_labels(&decoded(&result)), vec!["Page 4", "Page 2"]);
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.page_count, 4);
        assert_eq!(metrics.output_files, 1);
    }

    #[test]
    fn test_process_split_returns_archive() {
        let result = run(PdfCommand::Split {
            file: create_test_pdf(2),
            file_name: "deck.pdf".into(),
            view: Some(vec![1, 0]),
            selection: SelectionMode::All,
        });
        assert!(result.success);
        assert_eq!(result.file_name.as_deref(), Some("deck-split.zip"));
        assert_eq!(result.mime_type.as_deref(), Some("application/zip"));
        assert_eq!(result.metrics.unwrap().output_files, 2);
    }

    #[test]
    fn test_process_merge() {
        let result = run(PdfCommand::Merge {
            files: vec![create_test_pdf(1), create_test_pdf(2)],
        });
        assert!(result.success);
        assert_eq!(result.file_name.as_deref(), Some("merged.pdf"));
        assert_eq!(result.metrics.unwrap().page_count, 3);
    }

    #[test]
    fn test_process_rotate() {
        let result = run(PdfCommand::Rotate {
            file: create_test_pdf(1),
            file_name: "a.pdf".into(),
            spec: RotateSpec {
                degrees: 180,
                pages: PageTarget::All,
            },
        });
        assert!(result.success);
        assert_eq!(result.file_name.as_deref(), Some("a-rotated.pdf"));
    }

    #[test]
    fn test_process_edit() {
        let result = run(PdfCommand::Edit {
            file: create_test_pdf(3),
            file_name: "a.pdf".into(),
            view: vec![2, 1],
            rotations: BTreeMap::new(),
        });
        assert!(result.success);
        assert_eq!(page_labels(&decoded(&result)), vec!["Page 3", "Page 2"]);
    }

    #[test]
    fn test_input_error_message_is_shown() {
        let result = run(PdfCommand::Split {
            file: create_test_pdf(2),
            file_name: "a.pdf".into(),
            view: None,
            selection: SelectionMode::Ranges("   ".into()),
        });
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Please enter a page range"));
        assert!(result.data.is_none());
    }

    #[test]
    fn test_parse_failure_uses_generic_message() {
        let result = run(PdfCommand::Crop {
            file: b"%PDF-1.7 broken".to_vec(),
            file_name: "a.pdf".into(),
            margins: CropMargins::uniform(10.0),
            pages: PageTarget::All,
        });
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Processing failed. The file may be damaged or unsupported.")
        );
    }

    #[test]
    fn test_font_failure_message() {
        let result = run(PdfCommand::Watermark {
            file: create_test_pdf(1),
            file_name: "a.pdf".into(),
            watermark: TextWatermark {
                text: "Черновик".into(),
                ..Default::default()
            },
        });
        assert!(!result.success);
        assert!(result.error.unwrap().contains("font"));
    }
}
