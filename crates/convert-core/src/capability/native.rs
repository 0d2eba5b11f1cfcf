use super::{Capability, CapabilityError, CapabilityOptions};
use async_trait::async_trait;
use std::path::Path;

/// PNG/JPEG/GIF to single-page PDF, in process
pub struct ImageToPdfCapability;

#[async_trait]
impl Capability for ImageToPdfCapability {
    async fn invoke(
        &self,
        input: &Path,
        output: &Path,
        _options: &CapabilityOptions,
    ) -> Result<(), CapabilityError> {
        let input = input.to_path_buf();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || pdf_tools::image_to_pdf_file(&input, &output))
            .await
            .map_err(|e| CapabilityError::Failed(format!("Task join error: {}", e)))?
            .map_err(|e| CapabilityError::Failed(e.to_string()))
    }
}
