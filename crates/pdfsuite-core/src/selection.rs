//! Page selection resolution
//!
//! Turns what the user picked in a panel into an output plan: an ordered
//! list of groups, each group being the physical page indices (0-based) of
//! one output document.
//!
//! Positions always refer to the *view*, i.e. the pages as currently shown,
//! which may already have pages hidden or reordered. The resolver maps view
//! positions back to physical indices.

use crate::error::PdfSuiteError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered set of physical page indices as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentView {
    pages: Vec<usize>,
}

impl DocumentView {
    /// View showing every physical page in document order.
    pub fn identity(page_count: usize) -> Self {
        Self {
            pages: (0..page_count).collect(),
        }
    }

    /// Build a view over a document with `physical_count` pages.
    ///
    /// Every index must exist in the document and appear once.
    pub fn new(pages: Vec<usize>, physical_count: usize) -> Result<Self, PdfSuiteError> {
        let mut seen = HashSet::with_capacity(pages.len());
        for &index in &pages {
            if index >= physical_count {
                return Err(PdfSuiteError::InvalidInput(format!(
                    "Page index {} is out of range (document has {} pages)",
                    index, physical_count
                )));
            }
            if !seen.insert(index) {
                return Err(PdfSuiteError::InvalidInput(format!(
                    "Page index {} appears more than once",
                    index
                )));
            }
        }
        Ok(Self { pages })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Physical index shown at view `position`, if any.
    pub fn get(&self, position: usize) -> Option<usize> {
        self.pages.get(position).copied()
    }

    pub fn pages(&self) -> &[usize] {
        &self.pages
    }

    /// Hide the page at view `position`. Returns the removed physical index.
    pub fn remove(&mut self, position: usize) -> Option<usize> {
        if position < self.pages.len() {
            Some(self.pages.remove(position))
        } else {
            None
        }
    }

    /// Move the page at `from` so it ends up at view position `to`.
    pub fn move_page(&mut self, from: usize, to: usize) -> bool {
        if from >= self.pages.len() || to >= self.pages.len() {
            return false;
        }
        let page = self.pages.remove(from);
        self.pages.insert(to, page);
        true
    }
}

/// Which pages an operation works on, and how they are grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum SelectionMode {
    /// One output per page, in view order.
    All,
    /// One output per comma-separated token of a 1-based range string.
    Ranges(String),
    /// One output per selected view position, in selection order.
    Selected(Vec<usize>),
    /// One combined output with the selected positions, in selection order.
    Extract(Vec<usize>),
    /// One combined output with every position except these.
    Delete(Vec<usize>),
}

impl SelectionMode {
    /// Whether this mode produces one document per group (as opposed to a
    /// single combined document).
    pub fn is_multi_output(&self) -> bool {
        matches!(
            self,
            SelectionMode::All | SelectionMode::Ranges(_) | SelectionMode::Selected(_)
        )
    }
}

/// A parsed range token, still in 1-based view positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeToken {
    Single(i64),
    Span(i64, i64),
}

fn parse_token(token: &str) -> Option<RangeToken> {
    match token.split_once('-') {
        Some((start, end)) => {
            let start = start.trim().parse::<i64>().ok()?;
            let end = end.trim().parse::<i64>().ok()?;
            Some(RangeToken::Span(start, end))
        }
        None => token.parse::<i64>().ok().map(RangeToken::Single),
    }
}

/// Parse a range string into one slot per comma-separated token. Tokens
/// that are not numbers keep their slot as `None`. A blank or wholly
/// unreadable string yields no slots.
fn parse_tokens(input: &str) -> Vec<Option<RangeToken>> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    let tokens: Vec<Option<RangeToken>> =
        input.split(',').map(str::trim).map(parse_token).collect();
    if tokens.iter().all(Option::is_none) {
        return Vec::new();
    }
    tokens
}

fn resolve_token(view: &DocumentView, token: RangeToken) -> Vec<usize> {
    let len = view.len() as i64;
    let (start, end) = match token {
        RangeToken::Single(p) => (p, p),
        // start > end leaves an empty span; bounds are never swapped
        RangeToken::Span(start, end) => (start, end),
    };
    let first = start.max(1);
    let last = end.min(len);
    if first > last {
        return Vec::new();
    }
    (first..=last)
        .filter_map(|p| view.get((p - 1) as usize))
        .collect()
}

/// Resolve a selection against the current view.
///
/// Never fails: positions outside the view contribute nothing. Callers are
/// expected to run [`validate_selection`] first and to skip empty groups
/// when writing files.
pub fn resolve(view: &DocumentView, mode: &SelectionMode) -> Vec<Vec<usize>> {
    let plan: Vec<Vec<usize>> = match mode {
        SelectionMode::All => view.pages().iter().map(|&page| vec![page]).collect(),
        SelectionMode::Ranges(input) => parse_tokens(input)
            .into_iter()
            .map(|token| token.map_or_else(Vec::new, |t| resolve_token(view, t)))
            .collect(),
        SelectionMode::Selected(positions) => positions
            .iter()
            .map(|&pos| view.get(pos).into_iter().collect())
            .collect(),
        SelectionMode::Extract(positions) => {
            vec![positions.iter().filter_map(|&pos| view.get(pos)).collect()]
        }
        SelectionMode::Delete(positions) => {
            let excluded: HashSet<usize> = positions.iter().copied().collect();
            vec![view
                .pages()
                .iter()
                .enumerate()
                .filter(|(pos, _)| !excluded.contains(pos))
                .map(|(_, &page)| page)
                .collect()]
        }
    };

    tracing::debug!(groups = plan.len(), view_len = view.len(), "resolved page plan");
    plan
}

/// Check user input before resolving.
///
/// These are the blocking "fix your input" errors shown in the panel; the
/// resolver itself stays lenient.
pub fn validate_selection(view: &DocumentView, mode: &SelectionMode) -> Result<(), PdfSuiteError> {
    if view.is_empty() {
        return Err(PdfSuiteError::InvalidInput("No pages to process".into()));
    }

    match mode {
        SelectionMode::All => Ok(()),
        SelectionMode::Ranges(input) => {
            if input.trim().is_empty() {
                return Err(PdfSuiteError::InvalidInput(
                    "Please enter a page range".into(),
                ));
            }
            if parse_tokens(input).is_empty() {
                return Err(PdfSuiteError::InvalidInput(format!(
                    "Could not read page range \"{}\"",
                    input.trim()
                )));
            }
            Ok(())
        }
        SelectionMode::Selected(positions) => {
            if positions.is_empty() {
                return Err(PdfSuiteError::InvalidInput("No pages selected".into()));
            }
            let mut seen = HashSet::new();
            if let Some(&repeated) = positions.iter().find(|&&pos| !seen.insert(pos)) {
                return Err(PdfSuiteError::InvalidInput(format!(
                    "Page {} is selected more than once",
                    repeated + 1
                )));
            }
            Ok(())
        }
        SelectionMode::Extract(positions) => {
            if positions.is_empty() {
                Err(PdfSuiteError::InvalidInput("No pages selected".into()))
            } else {
                Ok(())
            }
        }
        SelectionMode::Delete(positions) => {
            if positions.is_empty() {
                return Err(PdfSuiteError::InvalidInput("No pages selected".into()));
            }
            let excluded: HashSet<usize> = positions.iter().copied().collect();
            if (0..view.len()).all(|pos| excluded.contains(&pos)) {
                return Err(PdfSuiteError::InvalidInput(
                    "Cannot delete every page of the document".into(),
                ));
            }
            Ok(())
        }
    }
}

/// Report the first token that is not `N` or `N-M`.
///
/// Returns None if valid, Some(error_message) if invalid. Used for inline
/// feedback while the user types; bounds are not checked here.
pub fn validate_range_syntax(range_str: &str) -> Option<String> {
    if range_str.trim().is_empty() {
        return Some("Page range cannot be empty".to_string());
    }

    for part in range_str.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Some("Empty entry in page range".to_string());
        }
        if part.matches('-').count() > 1 {
            return Some(format!("Invalid range format: {} has more than one '-'", part));
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let start = start.trim();
                let end = end.trim();
                let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
                if !digits(start) || !digits(end) {
                    return Some(format!("Invalid range format: {}", part));
                }
            }
            None => {
                if !part.chars().all(|c| c.is_ascii_digit()) {
                    return Some(format!("Invalid page number: {}", part));
                }
            }
        }
    }

    None
}
