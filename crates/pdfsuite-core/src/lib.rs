//! Client-side PDF page tools
//!
//! Everything here runs on bytes in memory, so the same code serves the
//! browser build and the command line:
//! - page selection: split, extract, delete and reorder (`selection`, `split`)
//! - `merge_documents`, `rotate_pages`, `crop_pages`
//! - text and image watermarks with per-page placeholders (`watermark`)
//! - page rendering to PNG (`render`)
//!
//! Multi-file results are packaged by `output` into a single download.

pub mod command;
pub mod crop;
pub mod error;
pub mod fonts;
pub mod inspect;
pub mod merge;
pub mod output;
mod page_tree;
pub mod placement;
pub mod render;
pub mod rotate;
pub mod selection;
pub mod split;
pub mod template;
pub mod watermark;

pub use command::{process_command, run_command, PdfCommand, ProcessMetrics, ProcessResult};
pub use crop::{crop_pages, CropMargins};
pub use error::PdfSuiteError;
pub use fonts::{FontSource, LoadedFont, NoFontSource, Script, StaticFontSource};
pub use inspect::{get_page_count, quick_validate, validate_pdf, PageInfo, PdfInfo};
pub use merge::merge_documents;
pub use output::{output_name, Download, OutputBundle, OutputFile, OutputSuffix};
pub use page_tree::PageTarget;
pub use placement::{Anchor, PageSize, Point, TextExtent};
pub use render::{export_images, HayroRasterizer, ImageExportOptions, PageRasterizer};
pub use rotate::{rotate_pages, RotateSpec};
pub use selection::{
    resolve, validate_range_syntax, validate_selection, DocumentView, SelectionMode,
};
pub use split::{apply_selection, assemble_pages, edit_document, split_by_plan};
pub use template::render_page_text;
pub use watermark::{watermark_image, watermark_text, ImageWatermark, TextWatermark};
