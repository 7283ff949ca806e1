//! Per-page watermark text placeholders
//!
//! Supported tokens: `{page}`, `{total}` and `{page:NN}` where `NN` is the
//! zero-padded width.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Widest `{page:NN}` padding that is expanded; wider tokens stay literal.
pub const MAX_PAD_WIDTH: usize = 1 << 20;

lazy_static! {
    static ref PADDED_PAGE: Regex = Regex::new(r"\{page:(\d+)\}").unwrap();
}

/// Expand placeholders for the page at `page_index` (0-based) of a document
/// with `total` pages.
pub fn render_page_text(template: &str, page_index: usize, total: usize) -> String {
    let page_number = page_index + 1;

    let text = template
        .replace("{page}", &page_number.to_string())
        .replace("{total}", &total.to_string());

    PADDED_PAGE
        .replace_all(&text, |caps: &Captures| match caps[1].parse::<usize>() {
            Ok(width) if width <= MAX_PAD_WIDTH => zero_pad(page_number, width),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Left-pad with zeros to `width` digits. `format!` width is capped at
/// `u16::MAX`, so the padding is built directly.
fn zero_pad(number: usize, width: usize) -> String {
    let digits = number.to_string();
    let mut padded = "0".repeat(width.saturating_sub(digits.len()));
    padded.push_str(&digits);
    padded
}

/// Whether the text changes from page to page.
pub fn has_placeholders(template: &str) -> bool {
    template.contains("{page}") || template.contains("{total}") || PADDED_PAGE.is_match(template)
}
