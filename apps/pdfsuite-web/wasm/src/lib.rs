//! WASM bindings for the PDF page tools
//!
//! Exposes a stateful session for the editor UI plus a few stateless helpers.
//! All document state is held in Rust; JavaScript handles DOM events and
//! saving downloads.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { PdfSuiteSession } from './pkg/pdfsuite_wasm.js';
//!
//! await init();
//!
//! const session = new PdfSuiteSession();
//! session.setProgressCallback((current, total, msg) => updateUI(current, total, msg));
//! const info = session.loadDocument("file.pdf", bytes);
//! session.movePage(3, 0);
//! session.rotatePage(0, 90);
//!
//! const result = session.exportSelection({ mode: "ranges", value: "1-3, 5" });
//! downloadBlob(result.bytes, result.fileName, result.mimeType);
//!
//! session.addMergeDocument("a.pdf", bytesA);
//! session.addMergeDocument("b.pdf", bytesB);
//! session.reorderMergeDocuments([1, 0]);
//! const merged = session.exportMerged();
//! ```

pub mod session;

use pdfsuite_core::{HayroRasterizer, NoFontSource, PdfCommand, ProcessResult};
use wasm_bindgen::prelude::*;

pub use session::{ExportResult, PdfSuiteSession};

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    pdfsuite_core::quick_validate(bytes).map_err(|e| JsValue::from_str(&e.user_message()))
}

/// Get detailed PDF info without creating a session
#[wasm_bindgen]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info =
        pdfsuite_core::validate_pdf(bytes).map_err(|e| JsValue::from_str(&e.user_message()))?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    pdfsuite_core::get_page_count(bytes)
        .map(|count| count as u32)
        .map_err(|e| JsValue::from_str(&e.user_message()))
}

/// Inline feedback for a page range; `undefined` when the syntax is fine
#[wasm_bindgen]
pub fn validate_range(range: &str) -> Option<String> {
    pdfsuite_core::validate_range_syntax(range)
}

/// Run one JSON-encoded command and return a JSON-encoded result
#[wasm_bindgen(js_name = processCommand)]
pub fn process_command(json: &str) -> String {
    process_command_json(json)
}

fn process_command_json(json: &str) -> String {
    let result = match serde_json::from_str::<PdfCommand>(json) {
        Ok(command) => pdfsuite_core::process_command(&command, &NoFontSource, &HayroRasterizer),
        Err(e) => ProcessResult::failure(format!("Invalid command: {}", e)),
    };
    serde_json::to_string(&result).unwrap_or_else(|e| {
        format!(
            r#"{{"success":false,"error":"Serialization error: {}"}}"#,
            e.to_string().replace('"', "'")
        )
    })
}

/// Format bytes as human-readable string
#[wasm_bindgen]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(2621440), "2.5 MB");
    }

    #[test]
    fn test_validate_range() {
        assert_eq!(validate_range("1-3, 5"), None);
        assert!(validate_range("1-x").is_some());
    }

    #[test]
    fn test_process_command_rejects_bad_json() {
        let out: serde_json::Value =
            serde_json::from_str(&process_command_json("{\"type\":\"Nope\"}")).unwrap();
        assert_eq!(out["success"], false);
        assert!(out["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid command"));
    }

    #[test]
    fn test_process_command_merge_needs_documents() {
        let out: serde_json::Value = serde_json::from_str(&process_command_json(
            r#"{"type":"Merge","files":[]}"#,
        ))
        .unwrap();
        assert_eq!(out["success"], false);
    }
}
