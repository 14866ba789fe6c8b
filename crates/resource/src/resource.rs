//! The model access resource: validate, create, read, update, import, destroy.
//!
//! One instance handles one apply step. It borrows the controller client and
//! owns the grant state it has observed so far.

use crate::diff::{diff, Operation};
use crate::lifecycle::{Lifecycle, Phase};
use juju_access_core::error::{AccessError, AccessResult};
use juju_access_core::{AccessGrant, AccessModelConfig, GrantState, ImportId};
use juju_access_provider::{ControllerClient, ModelAccess};
use std::collections::BTreeSet;

pub struct AccessModelResource<'a> {
    client: &'a dyn ControllerClient,
    lifecycle: Lifecycle,
    state: Option<GrantState>,
}

impl<'a> AccessModelResource<'a> {
    pub fn new(client: &'a dyn ControllerClient) -> Self {
        Self {
            client,
            lifecycle: Lifecycle::new(),
            state: None,
        }
    }

    /// Resumes a resource from persisted state.
    pub fn from_state(client: &'a dyn ControllerClient, state: GrantState) -> Self {
        Self {
            client,
            lifecycle: Lifecycle::created(),
            state: Some(state),
        }
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> Option<&GrantState> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<GrantState> {
        self.state
    }

    /// Validates the configuration block. Never touches the controller.
    pub fn validate(&mut self, config: &AccessModelConfig) -> AccessResult<AccessGrant> {
        self.lifecycle.advance(Phase::Validating)?;
        match config.validate() {
            Ok(grant) => Ok(grant),
            Err(e) => {
                tracing::warn!(model = %config.model, access = %config.access, error = %e, "invalid configuration");
                self.lifecycle.advance(Phase::Failed)?;
                Err(e)
            }
        }
    }

    /// Grants `grant.access` on `grant.model` to every user.
    ///
    /// All or nothing: if any grant fails, the ones already made are undone
    /// and each user is put back at the level it held before.
    pub async fn create(&mut self, grant: &AccessGrant) -> AccessResult<GrantState> {
        self.lifecycle.advance(Phase::Creating)?;

        match self.grant_all(grant).await {
            Ok(()) => {
                let state = GrantState::from(grant);
                tracing::info!(id = %state.id, "grant created");
                self.state = Some(state.clone());
                self.lifecycle.advance(Phase::Created)?;
                Ok(state)
            }
            Err(e) => {
                self.lifecycle.advance(Phase::Failed)?;
                Err(e)
            }
        }
    }

    async fn grant_all(&self, grant: &AccessGrant) -> AccessResult<()> {
        // Also fails fast with NotFound when the model is missing.
        let prior = self.client.model_access(&grant.model).await?;

        let mut granted: Vec<&str> = Vec::with_capacity(grant.users.len());
        for user in &grant.users {
            if let Err(e) = self
                .client
                .grant_model(&grant.model, user, grant.access)
                .await
            {
                tracing::warn!(
                    model = %grant.model,
                    user = %user,
                    error = %e,
                    rolling_back = granted.len(),
                    "grant failed"
                );
                self.rollback(grant, &prior, &granted).await;
                return Err(e);
            }
            granted.push(user);
        }
        Ok(())
    }

    async fn rollback(&self, grant: &AccessGrant, prior: &ModelAccess, granted: &[&str]) {
        for user in granted.iter().rev() {
            let previous = prior.get(*user).copied();
            if previous == Some(grant.access) {
                continue;
            }

            if let Err(e) = self
                .client
                .revoke_model(&grant.model, user, grant.access)
                .await
            {
                tracing::error!(model = %grant.model, user, error = %e, "rollback revoke failed");
                continue;
            }
            if let Some(level) = previous {
                if let Err(e) = self.client.grant_model(&grant.model, user, level).await {
                    tracing::error!(model = %grant.model, user, error = %e, "rollback restore failed");
                }
            }
        }
    }

    /// Re-fetches the grant from the controller.
    ///
    /// Users that no longer hold exactly the granted level drop out of the
    /// state. If none are left, or the model is gone, the state is cleared and
    /// `NotFound` is returned so the next apply recreates the grant.
    pub async fn read(&mut self) -> AccessResult<GrantState> {
        let current = self
            .state
            .clone()
            .ok_or_else(|| AccessError::Internal("read called without state".into()))?;
        self.lifecycle.advance(Phase::Reading)?;

        match self.fetch(&current).await {
            Ok(state) => {
                if state != current {
                    tracing::info!(
                        id = %current.id,
                        users_before = current.users.len(),
                        users_after = state.users.len(),
                        "drift detected"
                    );
                }
                self.state = Some(state.clone());
                self.lifecycle.advance(Phase::Created)?;
                Ok(state)
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(id = %current.id, "grant no longer present, removing from state");
                self.state = None;
                self.lifecycle.advance(Phase::Planned)?;
                Err(e)
            }
            Err(e) => {
                self.lifecycle.advance(Phase::Failed)?;
                Err(e)
            }
        }
    }

    async fn fetch(&self, current: &GrantState) -> AccessResult<GrantState> {
        let table = self.client.model_access(&current.model).await?;

        let users: BTreeSet<String> = current
            .users
            .iter()
            .filter(|user| table.get(*user) == Some(&current.access))
            .cloned()
            .collect();

        if users.is_empty() {
            return Err(AccessError::NotFound(format!(
                "no user holds {} access on model {:?}",
                current.access, current.model
            )));
        }

        Ok(GrantState::new(current.model.clone(), current.access, users))
    }

    /// Adds and removes users in place. `model` and `access` must be unchanged;
    /// changing either is a replacement.
    pub async fn update(&mut self, grant: &AccessGrant) -> AccessResult<GrantState> {
        let current = self
            .state
            .clone()
            .ok_or_else(|| AccessError::Internal("update called without state".into()))?;
        if current.model != grant.model || current.access != grant.access {
            return Err(AccessError::Internal(format!(
                "update cannot move {} to {}; replace instead",
                current.id,
                grant.id()
            )));
        }
        self.lifecycle.advance(Phase::Updating)?;

        let plan = diff(Some(grant), Some(&current));
        let mut users = current.users.clone();

        for op in &plan.operations {
            let result = match op {
                Operation::Grant {
                    model,
                    user,
                    access,
                } => self
                    .client
                    .grant_model(model, user, *access)
                    .await
                    .map(|()| {
                        users.insert(user.clone());
                    }),
                Operation::Revoke {
                    model,
                    user,
                    access,
                } => match self.client.revoke_model(model, user, *access).await {
                    Ok(()) => {
                        users.remove(user);
                        Ok(())
                    }
                    Err(e) if e.is_not_found() => {
                        users.remove(user);
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
            };

            if let Err(e) = result {
                tracing::warn!(op = %op, error = %e, "update step failed");
                self.state = Some(GrantState::new(current.model.clone(), current.access, users));
                self.lifecycle.advance(Phase::Failed)?;
                return Err(e);
            }
        }

        let state = GrantState::new(current.model, current.access, users);
        tracing::info!(id = %state.id, ops = plan.operations.len(), "grant updated");
        self.state = Some(state.clone());
        self.lifecycle.advance(Phase::Created)?;
        Ok(state)
    }

    /// Revokes exactly the access this resource granted.
    ///
    /// Users or models already removed out of band count as revoked. A user
    /// now holding a different level was changed by someone else and is left
    /// alone.
    pub async fn destroy(&mut self) -> AccessResult<()> {
        let Some(current) = self.state.clone() else {
            return Ok(());
        };
        self.lifecycle.advance(Phase::Destroying)?;

        let mut remaining = current.users.clone();
        for user in &current.users {
            match self
                .client
                .revoke_model(&current.model, user, current.access)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(model = %current.model, user = %user, "already revoked");
                }
                Err(AccessError::Conflict(reason)) => {
                    tracing::warn!(model = %current.model, user = %user, %reason, "access changed externally, leaving it");
                }
                Err(e) => {
                    self.state = Some(GrantState::new(
                        current.model.clone(),
                        current.access,
                        remaining,
                    ));
                    self.lifecycle.advance(Phase::Failed)?;
                    return Err(e);
                }
            }
            remaining.remove(user);
        }

        tracing::info!(id = %current.id, "grant destroyed");
        self.state = None;
        self.lifecycle.advance(Phase::Destroyed)?;
        Ok(())
    }

    /// Imports `model:access:user` and populates the state from the controller.
    pub async fn import_state(&mut self, id: &str) -> AccessResult<GrantState> {
        self.lifecycle.advance(Phase::Validating)?;
        let grant = match ImportId::parse(id).and_then(ImportId::into_grant) {
            Ok(grant) => grant,
            Err(e) => {
                self.lifecycle.advance(Phase::Failed)?;
                return Err(e);
            }
        };

        self.lifecycle.advance(Phase::Reading)?;
        let fetched = self.fetch(&GrantState::from(&grant)).await.and_then(|state| {
            if state.users == grant.users {
                return Ok(state);
            }
            let missing: Vec<&str> = grant
                .users
                .difference(&state.users)
                .map(String::as_str)
                .collect();
            tracing::warn!(id, missing = ?missing, "import id names users without the grant");
            Err(AccessError::NotFound(format!(
                "users {missing:?} do not hold {} access on model {:?}",
                grant.access, grant.model
            )))
        });

        match fetched {
            Ok(state) => {
                tracing::info!(id = %state.id, "grant imported");
                self.state = Some(state.clone());
                self.lifecycle.advance(Phase::Created)?;
                Ok(state)
            }
            Err(e) => {
                self.lifecycle.advance(Phase::Failed)?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juju_access_core::AccessLevel;
    use juju_access_provider::MemoryController;

    async fn controller() -> MemoryController {
        let c = MemoryController::new();
        c.create_model("testing").await.unwrap();
        c.create_user("alice", "pw").await.unwrap();
        c.create_user("bob", "pw").await.unwrap();
        c
    }

    fn config(access: &str, users: &[&str]) -> AccessModelConfig {
        AccessModelConfig::new("testing", access, users.iter().copied())
    }

    #[tokio::test]
    async fn invalid_access_fails_without_calls() {
        let c = controller().await;
        let before = c.calls().len();

        let mut r = AccessModelResource::new(&c);
        let err = r.validate(&config("bogus", &["alice"])).unwrap_err();
        assert!(matches!(err, AccessError::InvalidAccess(_)));
        assert_eq!(r.phase(), Phase::Failed);
        assert!(r.state().is_none());
        assert_eq!(c.calls().len(), before);
    }

    #[tokio::test]
    async fn create_and_read() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("write", &["alice", "bob"])).unwrap();
        let created = r.create(&grant).await.unwrap();
        assert_eq!(created.id, "testing:write:alice,bob");

        let read = r.read().await.unwrap();
        assert_eq!(read, created);
        assert_eq!(r.phase(), Phase::Created);
    }

    #[tokio::test]
    async fn create_rolls_back_on_failure() {
        let c = controller().await;
        c.grant_model("testing", "alice", AccessLevel::Read)
            .await
            .unwrap();

        // Users are granted in sorted order: alice is upgraded, then "zed"
        // does not exist and the whole create is undone.
        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("write", &["alice", "zed"])).unwrap();
        let err = r.create(&grant).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            r.lifecycle().history(),
            [Phase::Planned, Phase::Validating, Phase::Creating, Phase::Failed]
        );
        assert!(r.state().is_none());

        assert_eq!(c.access_of("testing", "alice"), Some(AccessLevel::Read));
        assert_eq!(c.access_of("testing", "zed"), None);
    }

    #[tokio::test]
    async fn create_rollback_removes_fresh_grants() {
        let c = controller().await;
        c.fail_next("grant_model", AccessError::Remote("denied".into()));

        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("read", &["alice"])).unwrap();
        assert_eq!(
            r.create(&grant).await.unwrap_err(),
            AccessError::Remote("denied".into())
        );
        assert_eq!(c.access_of("testing", "alice"), None);
    }

    #[tokio::test]
    async fn create_on_missing_model_is_not_found() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        let grant = r
            .validate(&AccessModelConfig::new("ghost", "read", ["alice"]))
            .unwrap();
        assert!(r.create(&grant).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn read_detects_partial_drift() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("read", &["alice", "bob"])).unwrap();
        r.create(&grant).await.unwrap();

        c.revoke_model("testing", "bob", AccessLevel::Read)
            .await
            .unwrap();
        let state = r.read().await.unwrap();
        assert_eq!(state.users.len(), 1);
        assert!(state.users.contains("alice"));
    }

    #[tokio::test]
    async fn read_detects_external_revoke() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("read", &["alice"])).unwrap();
        r.create(&grant).await.unwrap();

        c.revoke_model("testing", "alice", AccessLevel::Read)
            .await
            .unwrap();
        assert!(r.read().await.unwrap_err().is_not_found());
        assert_eq!(r.phase(), Phase::Planned);
        assert!(r.state().is_none());
    }

    #[tokio::test]
    async fn update_adds_and_removes_users() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("write", &["alice"])).unwrap();
        r.create(&grant).await.unwrap();

        let grant = r.validate(&config("write", &["bob"])).unwrap();
        let state = r.update(&grant).await.unwrap();
        assert_eq!(state.id, "testing:write:bob");
        assert_eq!(c.access_of("testing", "alice"), None);
        assert_eq!(c.access_of("testing", "bob"), Some(AccessLevel::Write));
    }

    #[tokio::test]
    async fn destroy_survives_deleted_user_and_model() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("admin", &["alice", "bob"])).unwrap();
        r.create(&grant).await.unwrap();

        c.destroy_user("bob").await.unwrap();
        c.destroy_model("testing").await.unwrap();
        r.destroy().await.unwrap();
        assert_eq!(r.phase(), Phase::Destroyed);
        assert!(r.state().is_none());
    }

    #[tokio::test]
    async fn destroy_leaves_upgraded_user_alone() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        let grant = r.validate(&config("read", &["alice"])).unwrap();
        r.create(&grant).await.unwrap();

        c.grant_model("testing", "alice", AccessLevel::Admin)
            .await
            .unwrap();
        r.destroy().await.unwrap();
        assert_eq!(c.access_of("testing", "alice"), Some(AccessLevel::Admin));
    }

    #[tokio::test]
    async fn import_reads_controller_state() {
        let c = controller().await;
        c.grant_model("testing", "alice", AccessLevel::Write)
            .await
            .unwrap();

        let mut r = AccessModelResource::new(&c);
        let state = r.import_state("testing:write:alice").await.unwrap();
        assert_eq!(state.model, "testing");
        assert_eq!(state.access, AccessLevel::Write);
        assert_eq!(state.id, "testing:write:alice");
    }

    #[tokio::test]
    async fn import_rejects_malformed_id_without_calls() {
        let c = controller().await;
        let before = c.calls().len();
        let mut r = AccessModelResource::new(&c);
        let err = r.import_state("testing:write").await.unwrap_err();
        assert!(matches!(err, AccessError::Parse { .. }));
        assert_eq!(c.calls().len(), before);
    }

    #[tokio::test]
    async fn import_rejects_partially_granted_id() {
        let c = controller().await;
        c.grant_model("testing", "alice", AccessLevel::Write)
            .await
            .unwrap();

        let mut r = AccessModelResource::new(&c);
        let err = r
            .import_state("testing:write:alice,bob")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("bob"));
        assert!(r.state().is_none());
        assert_eq!(r.phase(), Phase::Failed);
    }

    #[tokio::test]
    async fn import_of_absent_grant_fails() {
        let c = controller().await;
        let mut r = AccessModelResource::new(&c);
        assert!(r
            .import_state("testing:read:alice")
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(r.phase(), Phase::Failed);
    }
}
