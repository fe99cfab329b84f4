use formstamp_core::FormError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid --force-date '{0}': expected YYYY-MM-DD")]
    InvalidDateOverride(String),

    #[error("Invalid date format '{0}'")]
    InvalidDateFormat(String),

    #[error(transparent)]
    Form(#[from] FormError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::InvalidDateOverride(_) | CliError::InvalidDateFormat(_) => 2,
            CliError::Form(err) => err.exit_code(),
        }
    }
}
