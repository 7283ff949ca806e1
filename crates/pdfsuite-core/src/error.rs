use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfSuiteError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Font unavailable: {0}")]
    FontUnavailable(String),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PdfSuiteError {
    /// Message shown to the user when an operation fails.
    ///
    /// Validation problems are shown verbatim. A missing font gets its own
    /// message since the user can act on it; everything else collapses to a
    /// generic failure.
    pub fn user_message(&self) -> String {
        match self {
            PdfSuiteError::InvalidInput(msg) => msg.clone(),
            PdfSuiteError::FontUnavailable(_) => {
                "Could not load the font needed for this watermark text. \
                 Check your connection or provide a font, then try again."
                    .to_string()
            }
            _ => "Processing failed. The file may be damaged or unsupported.".to_string(),
        }
    }

    pub fn is_input_error(&self) -> bool {
        matches!(self, PdfSuiteError::InvalidInput(_))
    }
}

impl From<lopdf::Error> for PdfSuiteError {
    fn from(e: lopdf::Error) -> Self {
        PdfSuiteError::OperationError(e.to_string())
    }
}

impl From<zip::result::ZipError> for PdfSuiteError {
    fn from(e: zip::result::ZipError) -> Self {
        PdfSuiteError::ArchiveError(e.to_string())
    }
}
