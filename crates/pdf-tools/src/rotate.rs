//! Page rotation

use crate::error::PdfToolsError;
use crate::page::inherited_attribute;
use lopdf::{Document, Object};
use std::path::Path;

/// Rotate every page clockwise by `degrees`, which must be a multiple of 90.
/// Rotation is added to whatever the page (or its ancestors) already declare.
pub fn rotate_document(bytes: &[u8], degrees: i64) -> Result<Vec<u8>, PdfToolsError> {
    if degrees % 90 != 0 {
        return Err(PdfToolsError::InvalidArgument(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            degrees
        )));
    }

    let mut doc =
        Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;

    let page_ids: Vec<_> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        let current = inherited_attribute(&doc, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        let rotation = (current.rem_euclid(360) + degrees.rem_euclid(360)).rem_euclid(360);

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfToolsError::OperationError(format!("Invalid page object: {}", e)))?;
        page.set("Rotate", Object::Integer(rotation));
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

pub fn rotate_file(input: &Path, output: &Path, degrees: i64) -> Result<(), PdfToolsError> {
    let rotated = rotate_document(&std::fs::read(input)?, degrees)?;
    std::fs::write(output, rotated)?;
    Ok(())
}
