//! Plan / apply / destroy / import over a single resource instance.
//!
//! The engine holds the resource's persisted state between steps, the way a
//! Terraform state file does. Every step builds a fresh
//! [`AccessModelResource`] from that state.
//!
//! ```ignore
//! let mut engine = Engine::new(Arc::new(controller));
//! let outcome = engine.apply(&config).await?;
//! engine.import_verify(&outcome.state.id).await?;
//! engine.destroy().await?;
//! ```

use crate::diff::{diff, Action, Plan};
use crate::error::ApplyError;
use crate::resource::AccessModelResource;
use juju_access_core::error::AccessError;
use juju_access_core::{AccessModelConfig, GrantState};
use juju_access_provider::ControllerClient;
use std::sync::Arc;

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub plan: Plan,
    pub state: GrantState,
}

pub struct Engine {
    client: Arc<dyn ControllerClient>,
    state: Option<GrantState>,
}

impl Engine {
    pub fn new(client: Arc<dyn ControllerClient>) -> Self {
        Self {
            client,
            state: None,
        }
    }

    pub fn with_state(mut self, state: Option<GrantState>) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> Option<&GrantState> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<GrantState> {
        self.state
    }

    /// Validates, refreshes, and diffs without changing anything.
    pub async fn plan(&self, config: &AccessModelConfig) -> Result<Plan, ApplyError> {
        let mut resource = self.resource();
        let grant = resource
            .validate(config)
            .map_err(ApplyError::PreApplyRefresh)?;

        if resource.state().is_some() {
            match resource.read().await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(ApplyError::PreApplyRefresh(e)),
            }
        }

        Ok(diff(Some(&grant), resource.state()))
    }

    /// Brings the controller in line with `config`.
    ///
    /// Validation runs first; an invalid block fails with
    /// [`ApplyError::PreApplyRefresh`] before any controller call and leaves the
    /// state untouched.
    pub async fn apply(&mut self, config: &AccessModelConfig) -> Result<ApplyOutcome, ApplyError> {
        let client = Arc::clone(&self.client);
        let mut resource = match self.state.clone() {
            Some(state) => AccessModelResource::from_state(&*client, state),
            None => AccessModelResource::new(&*client),
        };

        let grant = resource
            .validate(config)
            .map_err(ApplyError::PreApplyRefresh)?;

        if resource.state().is_some() {
            match resource.read().await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    self.state = None;
                    resource
                        .validate(config)
                        .map_err(ApplyError::PreApplyRefresh)?;
                }
                Err(e) => return Err(ApplyError::PreApplyRefresh(e)),
            }
        }

        let plan = diff(Some(&grant), resource.state());
        tracing::info!(
            action = plan.action.as_str(),
            ops = plan.operations.len(),
            id = %grant.id(),
            "applying"
        );

        let result = match plan.action {
            Action::NoOp => resource
                .state()
                .cloned()
                .ok_or_else(|| AccessError::Internal("no-op plan without state".into())),
            Action::Create => resource.create(&grant).await,
            Action::Update => resource.update(&grant).await,
            Action::Replace => {
                let destroyed = resource.destroy().await;
                match destroyed {
                    Ok(()) => {
                        self.state = None;
                        resource = AccessModelResource::new(&*client);
                        match resource.validate(config) {
                            Ok(_) => resource.create(&grant).await,
                            Err(e) => Err(e),
                        }
                    }
                    Err(e) => Err(e),
                }
            }
            Action::Delete => Err(AccessError::Internal(
                "apply with a desired grant planned a delete".into(),
            )),
        };

        match result {
            Ok(state) => {
                self.state = Some(state.clone());
                Ok(ApplyOutcome { plan, state })
            }
            Err(e) => {
                tracing::warn!(
                    id = %grant.id(),
                    phases = ?resource.lifecycle().history(),
                    error = %e,
                    "apply failed"
                );
                self.state = resource.into_state();
                Err(ApplyError::Apply(e))
            }
        }
    }

    /// Re-reads the grant and stores what the controller reports.
    pub async fn refresh(&mut self) -> Result<Option<&GrantState>, ApplyError> {
        if let Some(state) = self.state.clone() {
            let mut resource = AccessModelResource::from_state(&*self.client, state);
            match resource.read().await {
                Ok(state) => self.state = Some(state),
                Err(e) if e.is_not_found() => self.state = None,
                Err(e) => return Err(ApplyError::PreApplyRefresh(e)),
            }
        }
        Ok(self.state.as_ref())
    }

    /// Revokes the managed grant and clears the state.
    pub async fn destroy(&mut self) -> Result<(), ApplyError> {
        let Some(state) = self.state.clone() else {
            tracing::debug!("nothing to destroy");
            return Ok(());
        };

        let client = Arc::clone(&self.client);
        let mut resource = AccessModelResource::from_state(&*client, state);
        match resource.read().await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                self.state = None;
                return Ok(());
            }
            Err(e) => return Err(ApplyError::Destroy(e)),
        }

        match resource.destroy().await {
            Ok(()) => {
                self.state = None;
                Ok(())
            }
            Err(e) => {
                self.state = resource.into_state();
                Err(ApplyError::Destroy(e))
            }
        }
    }

    /// Imports an existing grant into an empty state.
    pub async fn import(&mut self, id: &str) -> Result<GrantState, ApplyError> {
        if let Some(existing) = &self.state {
            return Err(ApplyError::Import {
                id: id.to_string(),
                source: AccessError::Conflict(format!(
                    "resource already manages {}",
                    existing.id
                )),
            });
        }

        let state = self.import_detached(id).await?;
        self.state = Some(state.clone());
        Ok(state)
    }

    /// Imports `id` into a scratch state and checks that every attribute
    /// equals the managed state. The managed state is not modified.
    pub async fn import_verify(&self, id: &str) -> Result<GrantState, ApplyError> {
        let expected = self.state.as_ref().ok_or_else(|| {
            ApplyError::ImportVerify("no managed state to verify against".into())
        })?;
        let imported = self.import_detached(id).await?;

        let mut mismatches = Vec::new();
        if imported.id != expected.id {
            mismatches.push(format!("id: {:?} != {:?}", expected.id, imported.id));
        }
        if imported.model != expected.model {
            mismatches.push(format!("model: {:?} != {:?}", expected.model, imported.model));
        }
        if imported.access != expected.access {
            mismatches.push(format!("access: {} != {}", expected.access, imported.access));
        }
        if imported.users != expected.users {
            mismatches.push(format!("users: {:?} != {:?}", expected.users, imported.users));
        }

        if mismatches.is_empty() {
            Ok(imported)
        } else {
            Err(ApplyError::ImportVerify(mismatches.join("; ")))
        }
    }

    async fn import_detached(&self, id: &str) -> Result<GrantState, ApplyError> {
        let mut resource = AccessModelResource::new(&*self.client);
        resource
            .import_state(id)
            .await
            .map_err(|source| ApplyError::Import {
                id: id.to_string(),
                source,
            })
    }

    fn resource(&self) -> AccessModelResource<'_> {
        match self.state.clone() {
            Some(state) => AccessModelResource::from_state(&*self.client, state),
            None => AccessModelResource::new(&*self.client),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juju_access_core::AccessLevel;
    use juju_access_provider::MemoryController;

    async fn setup() -> (Arc<MemoryController>, Engine) {
        let c = Arc::new(MemoryController::new());
        c.create_model("testing").await.unwrap();
        c.create_user("alice", "pw").await.unwrap();
        c.create_user("bob", "pw").await.unwrap();
        let engine = Engine::new(c.clone());
        (c, engine)
    }

    fn config(access: &str, users: &[&str]) -> AccessModelConfig {
        AccessModelConfig::new("testing", access, users.iter().copied())
    }

    #[tokio::test]
    async fn bogus_access_is_a_pre_apply_refresh_error() {
        let (c, mut engine) = setup().await;
        let before = c.calls().len();

        let err = engine.apply(&config("bogus", &["alice"])).await.unwrap_err();
        assert!(matches!(err, ApplyError::PreApplyRefresh(AccessError::InvalidAccess(_))));
        assert!(err.to_string().starts_with("Error running pre-apply refresh"));
        assert!(engine.state().is_none());
        assert_eq!(c.calls().len(), before);
    }

    #[tokio::test]
    async fn second_apply_is_noop() {
        let (_c, mut engine) = setup().await;
        let first = engine.apply(&config("write", &["alice"])).await.unwrap();
        assert_eq!(first.plan.action, Action::Create);

        let second = engine.apply(&config("write", &["alice"])).await.unwrap();
        assert_eq!(second.plan.action, Action::NoOp);
        assert_eq!(second.state, first.state);
    }

    #[tokio::test]
    async fn access_change_replaces_grant() {
        let (c, mut engine) = setup().await;
        engine.apply(&config("read", &["alice"])).await.unwrap();
        let outcome = engine.apply(&config("admin", &["alice"])).await.unwrap();
        assert_eq!(outcome.plan.action, Action::Replace);
        assert_eq!(outcome.state.access, AccessLevel::Admin);
        assert_eq!(c.access_of("testing", "alice"), Some(AccessLevel::Admin));
    }

    #[tokio::test]
    async fn externally_revoked_grant_is_recreated() {
        let (c, mut engine) = setup().await;
        engine.apply(&config("write", &["alice"])).await.unwrap();
        c.revoke_model("testing", "alice", AccessLevel::Write)
            .await
            .unwrap();

        let plan = engine.plan(&config("write", &["alice"])).await.unwrap();
        assert_eq!(plan.action, Action::Create);

        let outcome = engine.apply(&config("write", &["alice"])).await.unwrap();
        assert_eq!(outcome.plan.action, Action::Create);
        assert_eq!(c.access_of("testing", "alice"), Some(AccessLevel::Write));
    }

    #[tokio::test]
    async fn downgrade_is_rejected_and_state_stays_empty() {
        let (c, mut engine) = setup().await;
        c.grant_model("testing", "alice", AccessLevel::Admin)
            .await
            .unwrap();

        let err = engine.apply(&config("read", &["alice"])).await.unwrap_err();
        assert!(matches!(err, ApplyError::Apply(AccessError::Conflict(_))));
        assert!(engine.state().is_none());
    }

    #[tokio::test]
    async fn refresh_drops_vanished_grant() {
        let (c, mut engine) = setup().await;
        engine.apply(&config("read", &["alice"])).await.unwrap();
        c.destroy_model("testing").await.unwrap();
        assert!(engine.refresh().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn import_requires_empty_state() {
        let (_c, mut engine) = setup().await;
        engine.apply(&config("read", &["alice"])).await.unwrap();
        let err = engine.import("testing:read:alice").await.unwrap_err();
        assert!(matches!(err, ApplyError::Import { .. }));
    }

    #[tokio::test]
    async fn import_verify_reports_mismatch() {
        let (c, mut engine) = setup().await;
        engine.apply(&config("read", &["alice"])).await.unwrap();
        c.grant_model("testing", "bob", AccessLevel::Read)
            .await
            .unwrap();

        let err = engine
            .import_verify("testing:read:alice,bob")
            .await
            .unwrap_err();
        match err {
            ApplyError::ImportVerify(msg) => assert!(msg.contains("users")),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn destroy_without_state_is_noop() {
        let (c, mut engine) = setup().await;
        let before = c.calls().len();
        engine.destroy().await.unwrap();
        assert_eq!(c.calls().len(), before);
    }
}
