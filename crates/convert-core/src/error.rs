use pdf_tools::PdfToolsError;
use thiserror::Error;

/// Everything that can end a job early
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("'{file_name}' exceeds the {} MB size limit", .limit / (1024 * 1024))]
    PayloadTooLarge { file_name: String, limit: u64 },

    #[error("'{file_name}' has a forbidden file type ({mime})")]
    UnsafeFileType { file_name: String, mime: String },

    #[error("'{file_name}' is not a valid PDF file")]
    NotAPdf { file_name: String },

    /// `gap` marks pairs the service should support but does not (yet)
    #[error("{message}")]
    UnsupportedConversion { message: String, gap: bool },

    #[error("Conversion failed: {0}")]
    ConversionFailure(String),

    #[error("Conversion timed out after {0} seconds")]
    ConversionTimeout(u64),

    #[error("File not found or expired")]
    ArtifactExpiredOrMissing,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("The PDF is not encrypted")]
    NotEncrypted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "VALIDATION_ERROR",
            JobError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            JobError::UnsafeFileType { .. } => "UNSAFE_FILE_TYPE",
            JobError::NotAPdf { .. } => "NOT_A_PDF",
            JobError::UnsupportedConversion { gap: false, .. } => "UNSUPPORTED_CONVERSION",
            JobError::UnsupportedConversion { gap: true, .. } => "NOT_IMPLEMENTED",
            JobError::ConversionFailure(_) => "CONVERSION_FAILED",
            JobError::ConversionTimeout(_) => "CONVERSION_TIMEOUT",
            JobError::ArtifactExpiredOrMissing => "NOT_FOUND",
            JobError::WrongPassword => "WRONG_PASSWORD",
            JobError::NotEncrypted => "NOT_ENCRYPTED",
            JobError::Io(_) => "IO_ERROR",
        }
    }
}

impl From<PdfToolsError> for JobError {
    fn from(err: PdfToolsError) -> Self {
        match err {
            PdfToolsError::WrongPassword => JobError::WrongPassword,
            PdfToolsError::NotEncrypted => JobError::NotEncrypted,
            PdfToolsError::AlreadyEncrypted => {
                JobError::Validation("The PDF is already password protected".into())
            }
            PdfToolsError::InvalidArgument(msg) | PdfToolsError::InvalidRange(msg) => {
                JobError::Validation(msg)
            }
            other => JobError::ConversionFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_message_reports_megabytes() {
        let err = JobError::PayloadTooLarge {
            file_name: "big.pdf".into(),
            limit: 20 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "'big.pdf' exceeds the 20 MB size limit");
    }

    #[test]
    fn test_pdf_tool_errors_map_to_job_errors() {
        assert!(matches!(
            JobError::from(PdfToolsError::WrongPassword),
            JobError::WrongPassword
        ));
        assert!(matches!(
            JobError::from(PdfToolsError::AlreadyEncrypted),
            JobError::Validation(_)
        ));
        assert!(matches!(
            JobError::from(PdfToolsError::ParseError("bad xref".into())),
            JobError::ConversionFailure(_)
        ));
    }
}
