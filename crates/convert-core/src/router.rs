//! Source/target resolution for the general conversion endpoint
//!
//! The table is closed: every (source extension, target) pair either maps
//! to exactly one capability, is skipped, or is rejected. Only names are
//! consulted, never content.

use crate::capability::CapabilityId;
use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Pdf,
    Pptx,
    Docx,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => ".pdf",
            TargetFormat::Pptx => ".pptx",
            TargetFormat::Docx => ".docx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Convert {
        capability: CapabilityId,
        target: TargetFormat,
    },
    /// Unknown source and no explicit target: ignored
    Skip,
}

/// Lower-case, trimmed, without a leading dot; `None` when empty
pub fn normalize_target(raw: Option<&str>) -> Option<String> {
    raw.map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|t| !t.is_empty())
}

/// Resolve a source extension (with or without the dot) and an optional
/// requested target.
pub fn route(source_ext: &str, target: Option<&str>) -> Result<Route, JobError> {
    let source = format!(
        ".{}",
        source_ext.trim().trim_start_matches('.').to_ascii_lowercase()
    );
    let target = normalize_target(target);

    let default_target = match source.as_str() {
        ".docx" | ".pptx" | ".jpg" | ".jpeg" | ".png" => Some("pdf"),
        ".pdf" => Some("pptx"),
        _ => None,
    };
    let Some(target) = target.as_deref().or(default_target) else {
        return Ok(Route::Skip);
    };

    let convert = |capability, target| -> Result<Route, JobError> {
        Ok(Route::Convert { capability, target })
    };
    match (source.as_str(), target) {
        (".docx", "pdf") => convert(CapabilityId::DocumentToPdf, TargetFormat::Pdf),
        (".pptx", "pdf") => convert(CapabilityId::SlidesToPdf, TargetFormat::Pdf),
        (".pdf", "pptx") => convert(CapabilityId::PdfToSlides, TargetFormat::Pptx),
        (".pdf", "docx") => convert(CapabilityId::PdfToDocument, TargetFormat::Docx),
        (".png" | ".jpg" | ".jpeg", "pdf") => convert(CapabilityId::ImageToPdf, TargetFormat::Pdf),
        (".pdf", other) => Err(JobError::UnsupportedConversion {
            message: format!("Converting PDF to '{}' is not supported yet", other),
            gap: true,
        }),
        (".docx" | ".pptx" | ".png" | ".jpg" | ".jpeg", other) => {
            Err(JobError::UnsupportedConversion {
                message: format!("{} files can only be converted to PDF, not '{}'", source, other),
                gap: false,
            })
        }
        (_, other) => Err(JobError::UnsupportedConversion {
            message: format!("Cannot convert '{}' files to '{}'", source, other),
            gap: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn capability(source: &str, target: Option<&str>) -> CapabilityId {
        match route(source, target).unwrap() {
            Route::Convert { capability, .. } => capability,
            Route::Skip => panic!("{} -> {:?} was skipped", source, target),
        }
    }

    #[test]
    fn test_supported_pairs() {
        assert_eq!(capability(".docx", Some("pdf")), CapabilityId::DocumentToPdf);
        assert_eq!(capability(".pptx", Some("pdf")), CapabilityId::SlidesToPdf);
        assert_eq!(capability(".pdf", Some("pptx")), CapabilityId::PdfToSlides);
        assert_eq!(capability(".pdf", Some("docx")), CapabilityId::PdfToDocument);
        for image in [".png", ".jpg", ".jpeg"] {
            assert_eq!(capability(image, Some("pdf")), CapabilityId::ImageToPdf);
        }
    }

    #[test]
    fn test_default_targets() {
        assert_eq!(capability(".docx", None), CapabilityId::DocumentToPdf);
        assert_eq!(capability(".JPEG", None), CapabilityId::ImageToPdf);
        assert_eq!(capability(".pdf", None), CapabilityId::PdfToSlides);
        assert_eq!(capability("pdf", Some("  ")), CapabilityId::PdfToSlides);
    }

    #[test]
    fn test_target_is_normalized() {
        assert_eq!(capability(".pdf", Some(" .DOCX ")), CapabilityId::PdfToDocument);
        assert_eq!(normalize_target(Some("")), None);
        assert_eq!(normalize_target(Some(".Pdf")), Some("pdf".to_string()));
    }

    #[test]
    fn test_unknown_source_without_target_is_skipped() {
        assert_eq!(route(".txt", None).unwrap(), Route::Skip);
        assert_eq!(route("", None).unwrap(), Route::Skip);
    }

    #[test]
    fn test_pdf_gap_is_flagged() {
        let err = route(".pdf", Some("xlsx")).unwrap_err();
        assert!(matches!(err, JobError::UnsupportedConversion { gap: true, .. }));
    }

    #[test]
    fn test_office_to_non_pdf_rejected() {
        let err = route(".docx", Some("pptx")).unwrap_err();
        assert!(matches!(err, JobError::UnsupportedConversion { gap: false, .. }));
    }

    const SOURCES: &[&str] = &[".docx", ".pptx", ".pdf", ".png", ".jpg", ".jpeg", ".txt", ".xlsx", ""];
    const TARGETS: &[&str] = &["pdf", "pptx", "docx", "xlsx", "jpg", "txt"];

    proptest! {
        #[test]
        fn routing_table_is_closed(
            source in prop::sample::select(SOURCES),
            target in prop::option::of(prop::sample::select(TARGETS)),
            upper in any::<bool>(),
        ) {
            let source_input = if upper { source.to_uppercase() } else { source.to_string() };
            let result = route(&source_input, target);

            let expected = match (source, target) {
                (".docx", None | Some("pdf")) => Some(CapabilityId::DocumentToPdf),
                (".pptx", None | Some("pdf")) => Some(CapabilityId::SlidesToPdf),
                (".pdf", None | Some("pptx")) => Some(CapabilityId::PdfToSlides),
                (".pdf", Some("docx")) => Some(CapabilityId::PdfToDocument),
                (".png" | ".jpg" | ".jpeg", None | Some("pdf")) => Some(CapabilityId::ImageToPdf),
                _ => None,
            };

            match (expected, result) {
                (Some(id), Ok(Route::Convert { capability, target: format })) => {
                    prop_assert_eq!(id, capability);
                    let wanted = target.unwrap_or(if source == ".pdf" { "pptx" } else { "pdf" });
                    prop_assert_eq!(format.extension(), format!(".{}", wanted));
                }
                (None, Ok(Route::Skip)) => prop_assert!(target.is_none()),
                (None, Err(JobError::UnsupportedConversion { gap, .. })) => {
                    prop_assert!(target.is_some());
                    prop_assert_eq!(gap, source == ".pdf");
                }
                (expected, result) => {
                    prop_assert!(false, "{:?} -> {:?}: expected {:?}, got {:?}", source, target, expected, result);
                }
            }
        }
    }
}
