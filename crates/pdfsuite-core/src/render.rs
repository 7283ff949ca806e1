//! Page rasterization and image export
//!
//! Rendering sits behind [`PageRasterizer`] so callers (and tests) can swap
//! the engine. The default engine is hayro, which is pure Rust and runs in
//! the browser build as well.

use crate::error::PdfSuiteError;
use crate::output::{output_name, OutputBundle, OutputFile, OutputSuffix};
use crate::page_tree::{load, PageTarget};
use hayro::{render, Pdf, RenderSettings};
use hayro_interpret::InterpreterSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MIN_DPI: u32 = 72;
pub const MAX_DPI: u32 = 300;
pub const DEFAULT_DPI: u32 = 150;

/// Renders pages of a PDF to PNG.
pub trait PageRasterizer {
    /// PNG bytes for each page in `pages` (0-based), in the same order.
    fn render_pages(
        &self,
        pdf: &[u8],
        pages: &[usize],
        scale: f32,
    ) -> Result<Vec<Vec<u8>>, PdfSuiteError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HayroRasterizer;

impl PageRasterizer for HayroRasterizer {
    fn render_pages(
        &self,
        pdf: &[u8],
        pages: &[usize],
        scale: f32,
    ) -> Result<Vec<Vec<u8>>, PdfSuiteError> {
        let data = Arc::new(pdf.to_vec());
        let pdf = Pdf::new(data)
            .map_err(|e| PdfSuiteError::RenderError(format!("failed to parse PDF: {:?}", e)))?;

        let interpreter_settings = InterpreterSettings::default();
        let render_settings = RenderSettings {
            x_scale: scale,
            y_scale: scale,
            ..Default::default()
        };

        let mut rendered = Vec::with_capacity(pages.len());
        for &index in pages {
            let page = pdf.pages().iter().nth(index).ok_or_else(|| {
                PdfSuiteError::RenderError(format!("page {} not found", index + 1))
            })?;
            let pixmap = render(page, &interpreter_settings, &render_settings);
            let png_data = pixmap.take_png();
            rendered.push(png_data);
        }

        Ok(rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageExportOptions {
    pub dpi: u32,
    pub pages: PageTarget,
}

impl Default for ImageExportOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            pages: PageTarget::All,
        }
    }
}

/// PDF user space is 72 units per inch.
pub fn dpi_to_scale(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

pub fn validate_dpi(dpi: u32) -> Result<(), PdfSuiteError> {
    if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
        return Err(PdfSuiteError::InvalidInput(format!(
            "Resolution must be between {} and {} DPI",
            MIN_DPI, MAX_DPI
        )));
    }
    Ok(())
}

/// Render the targeted pages and pack them as `<stem>-<n>.png` inside
/// `<stem>-images.zip`, where `n` is the 1-based page number.
pub fn export_images(
    bytes: &[u8],
    file_name: &str,
    options: &ImageExportOptions,
    rasterizer: &dyn PageRasterizer,
) -> Result<OutputBundle, PdfSuiteError> {
    validate_dpi(options.dpi)?;
    let page_count = load(bytes)?.get_pages().len();
    let targets = options.pages.indices(page_count)?;

    let images = rasterizer.render_pages(bytes, &targets, dpi_to_scale(options.dpi))?;
    if images.len() != targets.len() {
        return Err(PdfSuiteError::RenderError(format!(
            "expected {} images, got {}",
            targets.len(),
            images.len()
        )));
    }

    tracing::debug!(pages = targets.len(), dpi = options.dpi, "rendered pages");

    let entries = targets
        .iter()
        .zip(images)
        .map(|(&index, png)| OutputFile {
            file_name: output_name(file_name, &OutputSuffix::Image(index + 1), "png"),
            bytes: png,
        })
        .collect();

    Ok(OutputBundle::Archive {
        file_name: output_name(file_name, &OutputSuffix::Images, "zip"),
        entries,
    })
}
