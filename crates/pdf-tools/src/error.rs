use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfToolsError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Image could not be processed: {0}")]
    ImageError(String),

    #[error("The PDF is not encrypted")]
    NotEncrypted,

    #[error("The PDF is already encrypted")]
    AlreadyEncrypted,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for PdfToolsError {
    fn from(err: lopdf::Error) -> Self {
        PdfToolsError::OperationError(err.to_string())
    }
}

impl From<image::ImageError> for PdfToolsError {
    fn from(err: image::ImageError) -> Self {
        PdfToolsError::ImageError(err.to_string())
    }
}
