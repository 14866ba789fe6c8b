//! Controller abstraction, in-memory controller, and retry policy.

pub mod memory;
pub mod retry;

use async_trait::async_trait;
use juju_access_core::{AccessLevel, AccessResult};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use memory::MemoryController;
pub use retry::{RetryPolicy, Retrying};

/// Users and the single access level each holds on one model.
pub type ModelAccess = BTreeMap<String, AccessLevel>;

/// Abstraction over the controller that stores the authoritative grants.
///
/// Model and user calls are the external collaborators the access resource
/// composes against; it never owns those entities.
#[async_trait]
pub trait ControllerClient: Send + Sync {
    async fn create_model(&self, name: &str) -> AccessResult<()>;
    async fn destroy_model(&self, name: &str) -> AccessResult<()>;

    async fn create_user(&self, name: &str, password: &str) -> AccessResult<()>;
    async fn destroy_user(&self, name: &str) -> AccessResult<()>;

    /// Current access table of `model`. `NotFound` if the model does not exist.
    async fn model_access(&self, model: &str) -> AccessResult<ModelAccess>;

    /// Grants `access` to `user`. Upgrading is allowed; granting a level below
    /// the one the user already holds fails with `Conflict`.
    async fn grant_model(&self, model: &str, user: &str, access: AccessLevel) -> AccessResult<()>;

    /// Revokes `access` from `user`. `NotFound` if the user holds nothing on
    /// the model, `Conflict` if it holds a different level.
    async fn revoke_model(&self, model: &str, user: &str, access: AccessLevel)
        -> AccessResult<()>;
}

#[async_trait]
impl<T: ControllerClient + ?Sized> ControllerClient for Arc<T> {
    async fn create_model(&self, name: &str) -> AccessResult<()> {
        (**self).create_model(name).await
    }

    async fn destroy_model(&self, name: &str) -> AccessResult<()> {
        (**self).destroy_model(name).await
    }

    async fn create_user(&self, name: &str, password: &str) -> AccessResult<()> {
        (**self).create_user(name, password).await
    }

    async fn destroy_user(&self, name: &str) -> AccessResult<()> {
        (**self).destroy_user(name).await
    }

    async fn model_access(&self, model: &str) -> AccessResult<ModelAccess> {
        (**self).model_access(model).await
    }

    async fn grant_model(&self, model: &str, user: &str, access: AccessLevel) -> AccessResult<()> {
        (**self).grant_model(model, user, access).await
    }

    async fn revoke_model(
        &self,
        model: &str,
        user: &str,
        access: AccessLevel,
    ) -> AccessResult<()> {
        (**self).revoke_model(model, user, access).await
    }
}
