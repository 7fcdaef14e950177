//! Error taxonomy for governance operations.

use thiserror::Error;

use crate::database::StoreError;

/// Result alias used across the governance engine.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Errors surfaced by governance operations.
///
/// Every variant except `Internal` is safe to show to the caller verbatim.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// No resolvable caller identity
    #[error("unauthorized")]
    Unauthorized,

    /// Caller is known but lacks the role or ownership required
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Referenced expert, user, ticket or signal is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input rejected before any domain logic ran
    #[error("validation error: {0}")]
    Validation(String),

    /// Illegal state transition or a precondition that no longer holds
    #[error("conflict: {0}")]
    Conflict(String),

    /// ML or workflow collaborator unreachable
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Unexpected fault; details are logged, never returned
    #[error("internal error: {0}")]
    Internal(String),
}

impl GovernanceError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<StoreError> for GovernanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(reason) => Self::Conflict(reason),
            StoreError::InvalidInput(reason) => Self::Validation(reason),
            StoreError::Serialization(reason) => Self::Internal(format!("serialization: {}", reason)),
            StoreError::Backend(reason) => Self::Internal(format!("store backend: {}", reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let err: GovernanceError = StoreError::Conflict("guard failed".into()).into();
        assert!(err.is_conflict());

        let err: GovernanceError = StoreError::Backend("connection reset".into()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");

        let err: GovernanceError = StoreError::NotFound("expert e1".into()).into();
        assert_eq!(err.to_string(), "not found: expert e1");
    }
}
