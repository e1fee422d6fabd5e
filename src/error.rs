use crate::validation::FieldErrors;
use thiserror::Error;

/// Backend-layer error type.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Permission evaluation never produces an error; these cover loading,
/// form validation and the feature slices.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend error wrapper.
    #[error("backend error: {0}")]
    Source(#[source] SourceError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission entry.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// Client-side form validation failed; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    /// Operation requires an authenticated actor.
    #[error("no authenticated user")]
    NotSignedIn,
    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<SourceError> for Error {
    fn from(error: SourceError) -> Self {
        Self::Source(error)
    }
}

impl From<FieldErrors> for Error {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}
