//! Service configuration, assembled once at startup and passed down

use crate::capability::{CapabilityId, CommandSpec};
use std::path::PathBuf;
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;

/// Default ceiling for every upload
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * MIB;
/// Ceiling for the compress endpoint
pub const DEFAULT_MAX_COMPRESS_SIZE: u64 = 100 * MIB;
/// How long successful job artifacts stay downloadable
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub upload_root: PathBuf,
    pub converted_root: PathBuf,
    pub max_file_size: u64,
    pub max_compress_size: u64,
    pub retention: Duration,
    pub conversion_timeout: Duration,
    pub converters: ConverterConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            converted_root: PathBuf::from("converted"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_compress_size: DEFAULT_MAX_COMPRESS_SIZE,
            retention: DEFAULT_RETENTION,
            conversion_timeout: DEFAULT_CONVERSION_TIMEOUT,
            converters: ConverterConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn with_roots(upload_root: impl Into<PathBuf>, converted_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            converted_root: converted_root.into(),
            ..Self::default()
        }
    }

    /// Largest body any endpoint accepts
    pub fn largest_ceiling(&self) -> u64 {
        self.max_file_size.max(self.max_compress_size)
    }
}

/// External converter commands, one slot per command-backed capability.
/// Office converters have no default and stay unavailable until set.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub document_to_pdf: Option<CommandSpec>,
    pub slides_to_pdf: Option<CommandSpec>,
    pub pdf_to_slides: Option<CommandSpec>,
    pub pdf_to_document: Option<CommandSpec>,
    pub pdf_to_spreadsheet: Option<CommandSpec>,
    pub pdf_to_jpg: Option<CommandSpec>,
    pub pdf_thumbnail: Option<CommandSpec>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            document_to_pdf: None,
            slides_to_pdf: None,
            pdf_to_slides: None,
            pdf_to_document: None,
            pdf_to_spreadsheet: None,
            pdf_to_jpg: Some(CommandSpec::new(
                "pdftoppm",
                &["-jpeg", "-r", "144", "{input}", "{output}/{base_name}_page"],
            )),
            pdf_thumbnail: Some(CommandSpec::new(
                "pdftoppm",
                &[
                    "-jpeg",
                    "-r",
                    "36",
                    "-f",
                    "1",
                    "-l",
                    "1",
                    "-singlefile",
                    "{input}",
                    "{output_stem}",
                ],
            )),
        }
    }
}

impl ConverterConfig {
    pub fn get(&self, id: CapabilityId) -> Option<&CommandSpec> {
        match id {
            CapabilityId::DocumentToPdf => self.document_to_pdf.as_ref(),
            CapabilityId::SlidesToPdf => self.slides_to_pdf.as_ref(),
            CapabilityId::PdfToSlides => self.pdf_to_slides.as_ref(),
            CapabilityId::PdfToDocument => self.pdf_to_document.as_ref(),
            CapabilityId::PdfToSpreadsheet => self.pdf_to_spreadsheet.as_ref(),
            CapabilityId::PdfToJpg => self.pdf_to_jpg.as_ref(),
            CapabilityId::PdfThumbnail => self.pdf_thumbnail.as_ref(),
            CapabilityId::ImageToPdf => None,
        }
    }
}
