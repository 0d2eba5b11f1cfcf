//! Converter backends
//!
//! A capability turns one input file into an output path. Heavy converters
//! run as external processes ([`CommandCapability`]); cheap ones run in
//! process ([`ImageToPdfCapability`]). Anything not configured resolves to
//! an implementation that always reports itself unavailable.

mod command;
mod native;

pub use command::{CommandCapability, CommandSpec};
pub use native::ImageToPdfCapability;

use crate::config::ConverterConfig;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityId {
    DocumentToPdf,
    SlidesToPdf,
    PdfToSlides,
    PdfToDocument,
    ImageToPdf,
    PdfToSpreadsheet,
    /// `output` is a directory receiving one JPEG per page
    PdfToJpg,
    /// `output` is the JPEG file to produce
    PdfThumbnail,
}

impl CapabilityId {
    pub const ALL: [CapabilityId; 8] = [
        CapabilityId::DocumentToPdf,
        CapabilityId::SlidesToPdf,
        CapabilityId::PdfToSlides,
        CapabilityId::PdfToDocument,
        CapabilityId::ImageToPdf,
        CapabilityId::PdfToSpreadsheet,
        CapabilityId::PdfToJpg,
        CapabilityId::PdfThumbnail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityId::DocumentToPdf => "document-to-pdf",
            CapabilityId::SlidesToPdf => "slides-to-pdf",
            CapabilityId::PdfToSlides => "pdf-to-slides",
            CapabilityId::PdfToDocument => "pdf-to-document",
            CapabilityId::ImageToPdf => "image-to-pdf",
            CapabilityId::PdfToSpreadsheet => "pdf-to-spreadsheet",
            CapabilityId::PdfToJpg => "pdf-to-jpg",
            CapabilityId::PdfThumbnail => "pdf-thumbnail",
        }
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra named values a capability may use, e.g. `base_name`
pub type CapabilityOptions = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("converter unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(
        &self,
        input: &Path,
        output: &Path,
        options: &CapabilityOptions,
    ) -> Result<(), CapabilityError>;
}

/// Stand-in for identifiers with no configured backend
struct Unconfigured(CapabilityId);

#[async_trait]
impl Capability for Unconfigured {
    async fn invoke(
        &self,
        _input: &Path,
        _output: &Path,
        _options: &CapabilityOptions,
    ) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable(format!(
            "no {} converter is configured",
            self.0
        )))
    }
}

/// Capability identifier -> implementation
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<CapabilityId, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Native image conversion plus one command capability per configured
    /// converter.
    pub fn from_config(config: &ConverterConfig) -> Self {
        let mut registry = Self::new();
        registry.register(CapabilityId::ImageToPdf, Arc::new(ImageToPdfCapability));

        for id in CapabilityId::ALL {
            if let Some(spec) = config.get(id) {
                tracing::info!("Using `{}` for {}", spec, id);
                registry.register(id, Arc::new(CommandCapability::new(spec.clone())));
            }
        }
        registry
    }

    pub fn register(&mut self, id: CapabilityId, capability: Arc<dyn Capability>) {
        self.entries.insert(id, capability);
    }

    pub fn get(&self, id: CapabilityId) -> Arc<dyn Capability> {
        self.entries
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Arc::new(Unconfigured(id)))
    }

    pub fn is_configured(&self, id: CapabilityId) -> bool {
        self.entries.contains_key(&id)
    }
}
