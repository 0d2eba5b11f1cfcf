//! In-process PDF operations
//!
//! Every operation has a byte-level form (`*_document`) and a path-level
//! form (`*_file`) used by the conversion service. All work is synchronous;
//! callers on an async runtime should run it on a blocking thread.

pub mod compress;
pub mod error;
pub mod image_pdf;
pub mod merge;
mod page;
pub mod rotate;
pub mod security;
pub mod split;
pub mod watermark;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use compress::{compress_document, compress_file, CompressionLevel};
pub use error::PdfToolsError;
pub use image_pdf::{image_to_pdf, image_to_pdf_file};
pub use merge::{merge_documents, merge_files};
pub use rotate::{rotate_document, rotate_file};
pub use security::{decrypt_document, decrypt_file, encrypt_document, encrypt_file, is_encrypted};
pub use split::{split_document, split_into_pages};
pub use watermark::{watermark_document, watermark_file};

/// Parse PDF bytes and return page count
pub fn page_count(bytes: &[u8]) -> Result<u32, PdfToolsError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&fixtures::document(7, "Count")).unwrap(), 7);
    }

    #[test]
    fn test_page_count_rejects_non_pdf() {
        assert!(matches!(
            page_count(b"%PNG not really"),
            Err(PdfToolsError::ParseError(_))
        ));
    }

    #[test]
    fn test_split_then_merge_restores_page_count() {
        let pdf = fixtures::document(4, "Cycle");
        let first = split_document(&pdf, vec![1, 2]).unwrap();
        let second = split_document(&pdf, vec![3, 4]).unwrap();
        let merged = merge_documents(vec![first, second]).unwrap();
        assert_eq!(page_count(&merged).unwrap(), 4);
    }
}
