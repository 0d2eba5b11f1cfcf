//! Multipart form collection
//!
//! Parts with a file name become uploads, in the order received. Everything
//! else is read as a text field.

use std::collections::HashMap;

use axum::extract::Multipart;
use convert_core::{JobError, Upload};

use crate::error::ApiError;

#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<Upload>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn collect(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when nothing was picked
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.push(Upload::new(file_name, bytes));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        tracing::debug!(
            "Collected {} file(s) and {} field(s)",
            form.files.len(),
            form.fields.len()
        );
        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Trimmed text field, `None` when absent or blank
    pub fn non_blank(&self, name: &str) -> Option<String> {
        self.field(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// The first uploaded file
    pub fn single_file(self) -> Result<Upload, ApiError> {
        self.files
            .into_iter()
            .next()
            .ok_or_else(|| JobError::Validation("No file was uploaded".into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: a present text field comes back trimmed and non-empty
        #[test]
        fn non_blank_values_are_trimmed(value in "\\PC{0,40}") {
            let mut form = UploadForm::default();
            form.fields.insert("field".into(), value.clone());

            match form.non_blank("field") {
                Some(found) => {
                    prop_assert_eq!(found.trim(), found.as_str());
                    prop_assert!(!found.is_empty());
                }
                None => {
                    prop_assert!(value.trim().is_empty());
                }
            }
        }
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let mut form = UploadForm::default();
        form.fields.insert("text".into(), "   ".into());
        form.fields.insert("level".into(), " high ".into());

        assert_eq!(form.non_blank("text"), None);
        assert_eq!(form.non_blank("level").as_deref(), Some("high"));
        assert_eq!(form.non_blank("missing"), None);
    }

    #[test]
    fn test_single_file_requires_an_upload() {
        let form = UploadForm::default();
        assert!(matches!(
            form.single_file(),
            Err(ApiError::Job(JobError::Validation(_)))
        ));
    }
}
