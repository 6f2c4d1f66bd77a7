//! Error types for nfoscene-parser
//!
//! Severity follows the run-level taxonomy:
//! - Source parse failures never surface here; the source chain recovers them
//! - Missing matches, ambiguity and suppressed creation are logged, not errors
//! - Catalog transport/authorization failures and configuration problems abort
//!   the run before any further scene is touched

use thiserror::Error;

/// Catalog client errors (all fatal to the run)
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network failure, timeout or unexpected HTTP status
    #[error("Catalog transport error: {0}")]
    Transport(String),

    /// HTTP 401 from the catalog
    #[error("HTTP Error 401, Unauthorised.")]
    Unauthorized,

    /// The catalog rejected the query
    #[error("GraphQL error: {0}")]
    Query(String),

    /// Response did not have the expected shape
    #[error("Unexpected catalog response: {0}")]
    Decode(String),
}

/// Run-level error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Catalog failure
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Invalid or incomplete configuration (e.g. missing reload marker tag)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Requested scene does not exist in the catalog
    #[error("Scene not found: {0}")]
    SceneNotFound(String),
}

impl PipelineError {
    /// Whether the failure came from catalog authorization
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PipelineError::Catalog(CatalogError::Unauthorized))
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message_is_distinct() {
        let err = PipelineError::from(CatalogError::Unauthorized);
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "HTTP Error 401, Unauthorised.");
    }

    #[test]
    fn test_configuration_message() {
        let err = PipelineError::Configuration("reload tag 'reload' not found".to_string());
        assert!(!err.is_unauthorized());
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
