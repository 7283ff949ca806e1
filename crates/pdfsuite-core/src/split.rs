//! Page assembly and splitting
//!
//! Every page-level transform (split, extract, delete, reorder) comes down to
//! building a new document from an ordered list of physical pages. The page
//! tree is rebuilt flat and everything no longer reachable is pruned.

use crate::error::PdfSuiteError;
use crate::output::{output_name, OutputBundle, OutputFile, OutputSuffix};
use crate::page_tree::{load, page_ids, rebuild_page_tree, save};
use crate::rotate::apply_rotation;
use crate::selection::{resolve, validate_selection, DocumentView, SelectionMode};
use lopdf::Document;
use std::collections::BTreeMap;

fn check_indices(indices: &[usize], page_count: usize) -> Result<(), PdfSuiteError> {
    if indices.is_empty() {
        return Err(PdfSuiteError::InvalidInput("No pages specified".into()));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i >= page_count) {
        return Err(PdfSuiteError::InvalidInput(format!(
            "Page {} does not exist (document has {} pages)",
            bad + 1,
            page_count
        )));
    }
    Ok(())
}

fn assemble(mut doc: Document, indices: &[usize]) -> Result<Vec<u8>, PdfSuiteError> {
    let ids = page_ids(&doc);
    check_indices(indices, ids.len())?;
    let selected: Vec<_> = indices.iter().map(|&i| ids[i]).collect();
    rebuild_page_tree(&mut doc, &selected)?;
    save(doc)
}

/// Build a document from the given physical pages (0-based), in order.
///
/// A page may appear more than once.
pub fn assemble_pages(bytes: &[u8], indices: &[usize]) -> Result<Vec<u8>, PdfSuiteError> {
    assemble(load(bytes)?, indices)
}

/// One document per non-empty group, tagged with the group's position in
/// the plan.
pub fn split_by_plan(
    bytes: &[u8],
    plan: &[Vec<usize>],
) -> Result<Vec<(usize, Vec<u8>)>, PdfSuiteError> {
    let doc = load(bytes)?;
    let mut outputs = Vec::new();
    for (group_index, group) in plan.iter().enumerate() {
        if group.is_empty() {
            tracing::warn!(group_index, "skipping empty group");
            continue;
        }
        outputs.push((group_index, assemble(doc.clone(), group)?));
    }
    Ok(outputs)
}

/// Run a page selection against `view` and package the result.
pub fn apply_selection(
    bytes: &[u8],
    file_name: &str,
    view: &DocumentView,
    mode: &SelectionMode,
) -> Result<OutputBundle, PdfSuiteError> {
    validate_selection(view, mode)?;
    let plan = resolve(view, mode);

    if !mode.is_multi_output() {
        let group = plan.into_iter().next().unwrap_or_default();
        if group.is_empty() {
            return Err(PdfSuiteError::InvalidInput(
                "The selection does not include any pages".into(),
            ));
        }
        let suffix = match mode {
            SelectionMode::Extract(_) => OutputSuffix::Extracted,
            _ => OutputSuffix::Edited,
        };
        return Ok(OutputBundle::Single(OutputFile {
            file_name: output_name(file_name, &suffix, "pdf"),
            bytes: assemble_pages(bytes, &group)?,
        }));
    }

    let parts = split_by_plan(bytes, &plan)?;
    if parts.is_empty() {
        return Err(PdfSuiteError::InvalidInput(
            "The page range does not match any pages".into(),
        ));
    }

    let entries = parts
        .into_iter()
        .map(|(group_index, pdf)| {
            let suffix = match mode {
                SelectionMode::Ranges(_) => OutputSuffix::Part(group_index + 1),
                SelectionMode::Selected(positions) => {
                    OutputSuffix::Page(positions[group_index] + 1)
                }
                _ => OutputSuffix::Page(group_index + 1),
            };
            OutputFile {
                file_name: output_name(file_name, &suffix, "pdf"),
                bytes: pdf,
            }
        })
        .collect();

    Ok(OutputBundle::Archive {
        file_name: output_name(file_name, &OutputSuffix::Split, "zip"),
        entries,
    })
}

/// Apply the page editor's state: the view's order (with hidden pages
/// dropped) plus per-page rotations keyed by physical index.
pub fn edit_document(
    bytes: &[u8],
    view: &DocumentView,
    rotations: &BTreeMap<usize, i64>,
) -> Result<Vec<u8>, PdfSuiteError> {
    if view.is_empty() {
        return Err(PdfSuiteError::InvalidInput(
            "Cannot delete every page of the document".into(),
        ));
    }
    let mut doc = load(bytes)?;
    let ids = page_ids(&doc);
    check_indices(view.pages(), ids.len())?;

    for (&page, &degrees) in rotations {
        let page_id = *ids.get(page).ok_or_else(|| {
            PdfSuiteError::InvalidInput(format!("Page {} does not exist", page + 1))
        })?;
        apply_rotation(&mut doc, page_id, degrees)?;
    }

    tracing::debug!(
        pages = view.len(),
        rotated = rotations.len(),
        "applying page edits"
    );
    assemble(doc, view.pages())
}
