use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Input file not found or unreadable: {}", path.display())]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("Field '{0}' not found for overlay")]
    FieldNotFound(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),

    #[error("Failed to write output file {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FormError {
    /// Process exit status for this error kind
    pub fn exit_code(&self) -> u8 {
        match self {
            FormError::Parse(_) | FormError::Operation(_) => 1,
            FormError::Config(_) => 2,
            FormError::InputNotFound { .. } => 3,
            FormError::EmptyDocument => 4,
            FormError::FieldNotFound(_) => 5,
            FormError::WriteFailure { .. } => 6,
        }
    }
}

impl From<lopdf::Error> for FormError {
    fn from(err: lopdf::Error) -> Self {
        FormError::Operation(err.to_string())
    }
}
