//! Errors surfaced by plan/apply/destroy/import.

use juju_access_core::AccessError;
use thiserror::Error;

/// Wraps an [`AccessError`] with the step that produced it.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Validation or refresh failed before any change was made.
    #[error("Error running pre-apply refresh: {0}")]
    PreApplyRefresh(#[source] AccessError),

    #[error("Error running apply: {0}")]
    Apply(#[source] AccessError),

    #[error("Error running destroy: {0}")]
    Destroy(#[source] AccessError),

    #[error("Error importing {id:?}: {source}")]
    Import { id: String, source: AccessError },

    #[error("ImportStateVerify attributes not equivalent: {0}")]
    ImportVerify(String),
}
