//! PDF Split algorithm
//!
//! Extracts pages from a PDF using "Construction by Whitelist".

use crate::error::PdfToolsError;
use lopdf::Document;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Split a PDF, extracting only the specified pages (1-indexed)
///
/// Uses "Construction by Whitelist" algorithm:
/// 1. Identify target page objects
/// 2. Delete every other page from a copy of the document
/// 3. Prune objects no longer reachable from the trailer
/// 4. Rebuild page tree
pub fn split_document(bytes: &[u8], pages: Vec<u32>) -> Result<Vec<u8>, PdfToolsError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;
    extract_pages(&doc, &pages)
}

fn extract_pages(doc: &Document, pages: &[u32]) -> Result<Vec<u8>, PdfToolsError> {
    if pages.is_empty() {
        return Err(PdfToolsError::InvalidRange("No pages specified".into()));
    }

    if pages.contains(&0) {
        return Err(PdfToolsError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }

    let page_count = doc.get_pages().len() as u32;

    for &page in pages {
        if page > page_count {
            return Err(PdfToolsError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                page, page_count
            )));
        }
    }

    let mut new_doc = doc.clone();

    let pages_to_keep: HashSet<u32> = pages.iter().copied().collect();
    let mut pages_to_delete: Vec<u32> = (1..=page_count)
        .filter(|p| !pages_to_keep.contains(p))
        .collect();

    // Delete in reverse order to maintain indices
    pages_to_delete.reverse();
    for page_num in pages_to_delete {
        new_doc.delete_pages(&[page_num]);
    }

    new_doc.prune_objects();
    new_doc.compress();

    let mut buffer = Vec::new();
    new_doc
        .save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Save failed: {}", e)))?;

    Ok(buffer)
}

/// Write every page of `input` as its own PDF named `<base_name>_page_<n>.pdf`
/// inside `output_dir`. Returns the written paths in page order.
pub fn split_into_pages(
    input: &Path,
    output_dir: &Path,
    base_name: &str,
) -> Result<Vec<PathBuf>, PdfToolsError> {
    let doc = Document::load(input).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;
    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(PdfToolsError::OperationError("Document has no pages".into()));
    }

    let mut written = Vec::with_capacity(page_count as usize);
    for page in 1..=page_count {
        let bytes = extract_pages(&doc, &[page])?;
        let path = output_dir.join(format!("{}_page_{}.pdf", base_name, page));
        std::fs::write(&path, bytes)?;
        written.push(path);
    }

    Ok(written)
}
