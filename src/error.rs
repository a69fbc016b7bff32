
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShadowviewError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid identity: {0}")]
    Identity(String),
    #[error("Invalid SQL: {0}")]
    InvalidSyntax(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("View construction failed: {0}")]
    ViewConstruction(String),
    #[error("Execution error: {0}")]
    Execution(String),
}

impl ShadowviewError {
    /// Whether a caller running the self-correction protocol may resubmit a
    /// rewritten query. Permission and construction failures are terminal:
    /// retrying under the same identity cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShadowviewError::InvalidSyntax(_) | ShadowviewError::Execution(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShadowviewError>;

// Helper conversions
impl From<config::ConfigError> for ShadowviewError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
