use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfOpsError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Unsupported image: {0}")]
    ImageError(String),

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("{0} is not supported by this backend")]
    Unsupported(String),
}
