//! Centralized error types for the access workspace.

use thiserror::Error;

/// Top-level error enum. Variants map to the failure classes a grant
/// operation can surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AccessError {
    #[error("Invalid access level {0:?}: expected one of admin, read, write")]
    InvalidAccess(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid import id {id:?}: {reason}")]
    Parse { id: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Controller error: {0}")]
    Remote(String),

    /// Transient controller failure. The only variant the retry policy retries.
    #[error("Controller unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AccessError::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound(_))
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_access_names_allowed_levels() {
        let e = AccessError::InvalidAccess("bogus".into());
        assert_eq!(
            e.to_string(),
            "Invalid access level \"bogus\": expected one of admin, read, write"
        );
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(AccessError::Unavailable("timeout".into()).is_transient());
        assert!(!AccessError::Remote("denied".into()).is_transient());
        assert!(!AccessError::NotFound("model".into()).is_transient());
    }
}
