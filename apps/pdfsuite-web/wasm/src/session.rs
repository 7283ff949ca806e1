//! Stateful PDF session management
//!
//! Holds the open document, the page view the user is editing, the merge
//! queue and any watermark font in Rust memory. JavaScript only forwards
//! events and saves the returned downloads.

use pdfsuite_core::{
    apply_selection, crop_pages, edit_document, export_images, merge_documents, output_name,
    rotate_pages, validate_pdf, watermark_image, watermark_text, CropMargins, DocumentView,
    Download, FontSource, HayroRasterizer, ImageExportOptions, ImageWatermark, NoFontSource,
    OutputBundle, OutputFile, OutputSuffix, PageTarget, PdfInfo, PdfSuiteError,
    RotateSpec, SelectionMode, StaticFontSource, TextWatermark,
};
use serde::Serialize;
use std::collections::BTreeMap;
use wasm_bindgen::prelude::*;

/// Document entry with metadata
struct DocumentEntry {
    name: String,
    bytes: Vec<u8>,
    info: PdfInfo,
}

impl DocumentEntry {
    fn load(name: &str, bytes: &[u8]) -> Result<Self, PdfSuiteError> {
        let info = validate_pdf(bytes)?;
        Ok(Self {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            info,
        })
    }
}

/// A finished export, ready to be saved by the browser.
#[wasm_bindgen]
pub struct ExportResult {
    download: Download,
}

#[wasm_bindgen]
impl ExportResult {
    #[wasm_bindgen(getter, js_name = fileName)]
    pub fn file_name(&self) -> String {
        self.download.file_name.clone()
    }

    #[wasm_bindgen(getter, js_name = mimeType)]
    pub fn mime_type(&self) -> String {
        self.download.mime_type.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> js_sys::Uint8Array {
        let array = js_sys::Uint8Array::new_with_length(self.download.bytes.len() as u32);
        array.copy_from(&self.download.bytes);
        array
    }
}

/// Stateful PDF session that holds documents in Rust memory
#[wasm_bindgen]
pub struct PdfSuiteSession {
    document: Option<DocumentEntry>,
    view: DocumentView,
    /// Editor rotations, keyed by physical page index
    rotations: BTreeMap<usize, i64>,
    merge_queue: Vec<DocumentEntry>,
    font: Option<StaticFontSource>,
    busy: bool,
    progress_callback: Option<js_sys::Function>,
}

impl Default for PdfSuiteSession {
    fn default() -> Self {
        Self::new()
    }
}

fn js_error(message: impl AsRef<str>) -> JsValue {
    JsValue::from_str(message.as_ref())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| js_error(format!("Serialization error: {}", e)))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| js_error(format!("Invalid options: {}", e)))
}

fn log_failure(operation: &str, error: &PdfSuiteError) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::error_1(&JsValue::from_str(&format!(
        "pdfsuite: {} failed: {}",
        operation, error
    )));
    #[cfg(not(target_arch = "wasm32"))]
    tracing::error!(operation, error = %error, "export failed");
}

fn single(file_name: String, bytes: Vec<u8>) -> OutputBundle {
    OutputBundle::Single(OutputFile { file_name, bytes })
}

#[wasm_bindgen]
impl PdfSuiteSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            document: None,
            view: DocumentView::identity(0),
            rotations: BTreeMap::new(),
            merge_queue: Vec::new(),
            font: None,
            busy: false,
            progress_callback: None,
        }
    }

    /// Set a progress callback function
    /// Callback signature: (current: number, total: number, message: string) => void
    #[wasm_bindgen(js_name = setProgressCallback)]
    pub fn set_progress_callback(&mut self, callback: js_sys::Function) {
        self.progress_callback = Some(callback);
    }

    /// TrueType font used for watermark text outside plain ASCII
    #[wasm_bindgen(js_name = setWatermarkFont)]
    pub fn set_watermark_font(&mut self, name: &str, bytes: &[u8]) {
        self.font = Some(StaticFontSource::new(name, bytes.to_vec()));
    }

    #[wasm_bindgen(getter, js_name = isBusy)]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    fn load_document_internal(&mut self, name: &str, bytes: &[u8]) -> Result<PdfInfo, String> {
        let entry = DocumentEntry::load(name, bytes).map_err(|e| e.user_message())?;
        let info = entry.info.clone();
        self.view = DocumentView::identity(info.page_count);
        self.rotations.clear();
        self.document = Some(entry);
        Ok(info)
    }

    /// Open a document, replacing any previous one and resetting the view.
    /// Returns document info on success
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, name: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let info = self.load_document_internal(name, bytes).map_err(js_error)?;
        to_js(&info)
    }

    #[wasm_bindgen(js_name = closeDocument)]
    pub fn close_document(&mut self) {
        self.document = None;
        self.view = DocumentView::identity(0);
        self.rotations.clear();
    }

    #[wasm_bindgen(js_name = hasDocument)]
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    fn document(&self) -> Result<&DocumentEntry, String> {
        self.document
            .as_ref()
            .ok_or_else(|| "No document loaded".to_string())
    }

    /// Page infos for every physical page, in document order
    #[wasm_bindgen(js_name = getPageInfos)]
    pub fn get_page_infos(&self) -> Result<JsValue, JsValue> {
        let doc = self.document().map_err(js_error)?;
        let infos = pdfsuite_core::inspect::page_infos(&doc.bytes)
            .map_err(|e| js_error(e.user_message()))?;
        to_js(&infos)
    }

    /// Physical page indices in the order currently shown
    #[wasm_bindgen(js_name = getView)]
    pub fn get_view(&self) -> Vec<usize> {
        self.view.pages().to_vec()
    }

    #[wasm_bindgen(js_name = resetView)]
    pub fn reset_view(&mut self) {
        let count = self.document.as_ref().map_or(0, |d| d.info.page_count);
        self.view = DocumentView::identity(count);
        self.rotations.clear();
    }

    /// Hide the page at view `position`
    #[wasm_bindgen(js_name = removePage)]
    pub fn remove_page(&mut self, position: usize) -> Result<(), JsValue> {
        if self.view.len() <= 1 {
            return Err(js_error("Cannot delete every page of the document"));
        }
        self.view
            .remove(position)
            .map(|_| ())
            .ok_or_else(|| js_error("Page position out of bounds"))
    }

    #[wasm_bindgen(js_name = movePage)]
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), JsValue> {
        if self.view.move_page(from, to) {
            Ok(())
        } else {
            Err(js_error("Page position out of bounds"))
        }
    }

    fn rotate_page_internal(&mut self, position: usize, degrees: i64) -> Result<i64, String> {
        if degrees % 90 != 0 {
            return Err("Rotation must be a multiple of 90 degrees".to_string());
        }
        let page = self
            .view
            .get(position)
            .ok_or_else(|| "Page position out of bounds".to_string())?;
        let entry = self.rotations.entry(page).or_insert(0);
        *entry = (*entry + degrees).rem_euclid(360);
        Ok(*entry)
    }

    /// Rotate one page in the editor; returns the page's pending rotation
    #[wasm_bindgen(js_name = rotatePage)]
    pub fn rotate_page(&mut self, position: usize, degrees: i64) -> Result<i64, JsValue> {
        self.rotate_page_internal(position, degrees).map_err(js_error)
    }

    /// Inline feedback for a page range being typed
    #[wasm_bindgen(js_name = validateRange)]
    pub fn validate_range(&self, range: &str) -> Option<String> {
        pdfsuite_core::validate_range_syntax(range)
    }

    // ============================================================
    // Merge queue
    // ============================================================

    fn add_merge_document_internal(&mut self, name: &str, bytes: &[u8]) -> Result<PdfInfo, String> {
        let entry = DocumentEntry::load(name, bytes).map_err(|e| e.user_message())?;
        let info = entry.info.clone();
        self.merge_queue.push(entry);
        Ok(info)
    }

    #[wasm_bindgen(js_name = addMergeDocument)]
    pub fn add_merge_document(&mut self, name: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let info = self.add_merge_document_internal(name, bytes).map_err(js_error)?;
        to_js(&info)
    }

    #[wasm_bindgen(js_name = removeMergeDocument)]
    pub fn remove_merge_document(&mut self, index: usize) -> Result<(), JsValue> {
        if index >= self.merge_queue.len() {
            return Err(js_error("Document index out of bounds"));
        }
        self.merge_queue.remove(index);
        Ok(())
    }

    fn reorder_merge_documents_internal(&mut self, new_order: &[usize]) -> Result<(), String> {
        if new_order.len() != self.merge_queue.len() {
            return Err("Invalid order: wrong number of indices".to_string());
        }

        let mut seen = vec![false; self.merge_queue.len()];
        for &idx in new_order {
            if idx >= self.merge_queue.len() {
                return Err("Invalid order: index out of bounds".to_string());
            }
            if seen[idx] {
                return Err("Invalid order: duplicate index".to_string());
            }
            seen[idx] = true;
        }

        let mut slots: Vec<Option<DocumentEntry>> =
            self.merge_queue.drain(..).map(Some).collect();
        self.merge_queue = new_order
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect();
        Ok(())
    }

    /// new_order is an array of current indices in the desired new order
    #[wasm_bindgen(js_name = reorderMergeDocuments)]
    pub fn reorder_merge_documents(&mut self, new_order: &[usize]) -> Result<(), JsValue> {
        self.reorder_merge_documents_internal(new_order)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = getMergeDocuments)]
    pub fn get_merge_documents(&self) -> Result<JsValue, JsValue> {
        let infos: Vec<_> = self
            .merge_queue
            .iter()
            .map(|d| DocumentInfoJs {
                name: d.name.clone(),
                page_count: d.info.page_count,
                size_bytes: d.bytes.len(),
                version: d.info.version.clone(),
                encrypted: d.info.encrypted,
            })
            .collect();
        to_js(&infos)
    }

    // ============================================================
    // Exports
    // ============================================================

    /// Run one export with the busy flag held and failures logged.
    fn run_export<F>(&mut self, operation: &str, work: F) -> Result<Download, String>
    where
        F: FnOnce(&Self) -> Result<OutputBundle, PdfSuiteError>,
    {
        if self.busy {
            return Err("Another export is still running".to_string());
        }
        self.busy = true;
        self.report_progress(0, 100, "Starting...");

        let result = work(self).and_then(OutputBundle::into_download);

        self.busy = false;
        match result {
            Ok(download) => {
                self.report_progress(100, 100, "Complete");
                Ok(download)
            }
            Err(e) => {
                log_failure(operation, &e);
                Err(e.user_message())
            }
        }
    }

    fn export_selection_internal(&mut self, mode: &SelectionMode) -> Result<Download, String> {
        self.run_export("split", |s| {
            let doc = s
                .document
                .as_ref()
                .ok_or_else(|| PdfSuiteError::InvalidInput("No document loaded".into()))?;
            s.report_progress(10, 100, "Extracting pages...");
            apply_selection(&doc.bytes, &doc.name, &s.view, mode)
        })
    }

    /// `mode` is `{ mode: "all" | "ranges" | "selected" | "extract" | "delete", value }`
    #[wasm_bindgen(js_name = exportSelection)]
    pub fn export_selection(&mut self, mode: JsValue) -> Result<ExportResult, JsValue> {
        let mode: SelectionMode = from_js(mode)?;
        self.export_selection_internal(&mode)
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    fn with_document<F>(&mut self, operation: &str, work: F) -> Result<Download, String>
    where
        F: FnOnce(&Self, &DocumentEntry) -> Result<OutputBundle, PdfSuiteError>,
    {
        self.run_export(operation, |s| {
            let doc = s
                .document
                .as_ref()
                .ok_or_else(|| PdfSuiteError::InvalidInput("No document loaded".into()))?;
            work(s, doc)
        })
    }

    fn export_rotated_internal(&mut self, spec: &RotateSpec) -> Result<Download, String> {
        self.with_document("rotate", |_, doc| {
            Ok(single(
                output_name(&doc.name, &OutputSuffix::Rotated, "pdf"),
                rotate_pages(&doc.bytes, spec)?,
            ))
        })
    }

    #[wasm_bindgen(js_name = exportRotated)]
    pub fn export_rotated(&mut self, spec: JsValue) -> Result<ExportResult, JsValue> {
        let spec: RotateSpec = from_js(spec)?;
        self.export_rotated_internal(&spec)
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    fn export_cropped_internal(
        &mut self,
        margins: &CropMargins,
        pages: &PageTarget,
    ) -> Result<Download, String> {
        self.with_document("crop", |_, doc| {
            Ok(single(
                output_name(&doc.name, &OutputSuffix::Cropped, "pdf"),
                crop_pages(&doc.bytes, margins, pages)?,
            ))
        })
    }

    #[wasm_bindgen(js_name = exportCropped)]
    pub fn export_cropped(
        &mut self,
        margins: JsValue,
        pages: JsValue,
    ) -> Result<ExportResult, JsValue> {
        let margins: CropMargins = from_js(margins)?;
        let pages: PageTarget = if pages.is_undefined() || pages.is_null() {
            PageTarget::All
        } else {
            from_js(pages)?
        };
        self.export_cropped_internal(&margins, &pages)
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    fn export_text_watermark_internal(
        &mut self,
        watermark: &TextWatermark,
    ) -> Result<Download, String> {
        self.with_document("watermark", |s, doc| {
            s.report_progress(20, 100, "Applying watermark...");
            let fonts: &dyn FontSource = match &s.font {
                Some(font) => font,
                None => &NoFontSource,
            };
            Ok(single(
                output_name(&doc.name, &OutputSuffix::Watermarked, "pdf"),
                watermark_text(&doc.bytes, watermark, fonts)?,
            ))
        })
    }

    #[wasm_bindgen(js_name = exportTextWatermark)]
    pub fn export_text_watermark(&mut self, options: JsValue) -> Result<ExportResult, JsValue> {
        let watermark: TextWatermark = from_js(options)?;
        self.export_text_watermark_internal(&watermark)
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    fn export_image_watermark_internal(
        &mut self,
        png: &[u8],
        watermark: &ImageWatermark,
    ) -> Result<Download, String> {
        self.with_document("image watermark", |_, doc| {
            Ok(single(
                output_name(&doc.name, &OutputSuffix::Watermarked, "pdf"),
                watermark_image(&doc.bytes, png, watermark)?,
            ))
        })
    }

    #[wasm_bindgen(js_name = exportImageWatermark)]
    pub fn export_image_watermark(
        &mut self,
        png: &[u8],
        options: JsValue,
    ) -> Result<ExportResult, JsValue> {
        let watermark: ImageWatermark = from_js(options)?;
        self.export_image_watermark_internal(png, &watermark)
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    fn export_images_internal(&mut self, dpi: u32) -> Result<Download, String> {
        self.with_document("images", |s, doc| {
            // Only pages still in the view are exported, in view order
            let options = ImageExportOptions {
                dpi,
                pages: PageTarget::Only(s.view.pages().to_vec()),
            };
            s.report_progress(10, 100, "Rendering pages...");
            export_images(&doc.bytes, &doc.name, &options, &HayroRasterizer)
        })
    }

    #[wasm_bindgen(js_name = exportImages)]
    pub fn export_images(&mut self, dpi: u32) -> Result<ExportResult, JsValue> {
        self.export_images_internal(dpi)
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    fn export_edited_internal(&mut self) -> Result<Download, String> {
        self.with_document("edit", |s, doc| {
            Ok(single(
                output_name(&doc.name, &OutputSuffix::Edited, "pdf"),
                edit_document(&doc.bytes, &s.view, &s.rotations)?,
            ))
        })
    }

    /// Export the editor state: view order, hidden pages and rotations
    #[wasm_bindgen(js_name = exportEdited)]
    pub fn export_edited(&mut self) -> Result<ExportResult, JsValue> {
        self.export_edited_internal()
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    fn export_merged_internal(&mut self) -> Result<Download, String> {
        self.run_export("merge", |s| {
            if s.merge_queue.len() < 2 {
                return Err(PdfSuiteError::InvalidInput(
                    "Add at least two documents to merge".into(),
                ));
            }
            let total = s.merge_queue.len();
            let docs: Vec<Vec<u8>> = s
                .merge_queue
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    s.report_progress(
                        5 + (i * 80 / total) as u32,
                        100,
                        &format!("Processing document {}/{}...", i + 1, total),
                    );
                    d.bytes.clone()
                })
                .collect();
            s.report_progress(85, 100, "Merging...");
            Ok(single("merged.pdf".to_string(), merge_documents(docs)?))
        })
    }

    #[wasm_bindgen(js_name = exportMerged)]
    pub fn export_merged(&mut self) -> Result<ExportResult, JsValue> {
        self.export_merged_internal()
            .map(|download| ExportResult { download })
            .map_err(js_error)
    }

    /// Report progress to JavaScript callback
    fn report_progress(&self, current: u32, total: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            let this = JsValue::null();
            let _ = callback.call3(
                &this,
                &JsValue::from(current),
                &JsValue::from(total),
                &JsValue::from_str(message),
            );
        }
    }
}

/// Document info for JS serialization
#[derive(Serialize)]
struct DocumentInfoJs {
    name: String,
    page_count: usize,
    size_bytes: usize,
    version: String,
    encrypted: bool,
}


#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_load_rejects_garbage() {
        let mut session = PdfSuiteSession::new();
        assert!(session.load_document("x.pdf", b"garbage").is_err());
        assert!(!session.has_document());
    }

    #[wasm_bindgen_test]
    fn test_export_without_document_is_error() {
        let mut session = PdfSuiteSession::new();
        assert!(session.export_edited().is_err());
        assert!(!session.is_busy());
    }

    #[wasm_bindgen_test]
    fn test_invalid_selection_options() {
        let mut session = PdfSuiteSession::new();
        let bad = JsValue::from_str("not an object");
        assert!(session.export_selection(bad).is_err());
    }
}
