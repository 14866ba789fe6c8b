//! In-process controller with JSON snapshots.
//!
//! Enforces the same grant rules a real controller does (single level per
//! user per model, upgrade-only grants) so the resource can be exercised
//! end to end without a network. Snapshots let the CLI carry controller
//! state across invocations.
//!
//! ```ignore
//! let controller = MemoryController::load("controller.json")?;
//! controller.create_model("testing1").await?;
//! controller.save("controller.json")?;
//! ```

use crate::{ControllerClient, ModelAccess};
use async_trait::async_trait;
use juju_access_core::error::{AccessError, AccessResult};
use juju_access_core::AccessLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    models: BTreeMap<String, ModelAccess>,
    users: BTreeMap<String, UserRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    /// Only the presence of a password is kept; snapshots never hold secrets.
    has_password: bool,
}

/// Call log and queued failures, for tests.
#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<String>,
    faults: Vec<(String, AccessError)>,
}

#[derive(Debug, Default)]
pub struct MemoryController {
    tables: Mutex<Tables>,
    recorder: Mutex<Recorder>,
}

impl MemoryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot. A missing file yields an empty controller.
    pub fn load(path: impl AsRef<Path>) -> AccessResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no controller snapshot, starting empty");
            return Ok(Self::new());
        }

        let file = std::fs::File::open(path).map_err(|e| {
            AccessError::Internal(format!("Failed to open {}: {e}", path.display()))
        })?;
        let tables: Tables = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| AccessError::Internal(format!("Bad snapshot {}: {e}", path.display())))?;

        tracing::debug!(
            path = %path.display(),
            models = tables.models.len(),
            users = tables.users.len(),
            "loaded controller snapshot"
        );

        Ok(Self {
            tables: Mutex::new(tables),
            recorder: Mutex::default(),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> AccessResult<()> {
        let path = path.as_ref();
        let tables = self.tables()?;
        let json = serde_json::to_string_pretty(&*tables)
            .map_err(|e| AccessError::Internal(format!("Failed to encode snapshot: {e}")))?;
        std::fs::write(path, json).map_err(|e| {
            AccessError::Internal(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Makes the next call to `op` fail with `err`. Queued per operation name.
    pub fn fail_next(&self, op: &str, err: AccessError) {
        if let Ok(mut rec) = self.recorder.lock() {
            rec.faults.push((op.to_string(), err));
        }
    }

    /// Names of every operation invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.recorder
            .lock()
            .map(|rec| rec.calls.clone())
            .unwrap_or_default()
    }

    /// Direct lookup of one user's level, bypassing the call log.
    pub fn access_of(&self, model: &str, user: &str) -> Option<AccessLevel> {
        self.tables
            .lock()
            .ok()?
            .models
            .get(model)?
            .get(user)
            .copied()
    }

    fn tables(&self) -> AccessResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AccessError::Internal("controller lock poisoned".into()))
    }

    /// Records the call and pops a queued fault for it, if any.
    fn enter(&self, op: &str) -> AccessResult<()> {
        let mut rec = self
            .recorder
            .lock()
            .map_err(|_| AccessError::Internal("recorder lock poisoned".into()))?;
        rec.calls.push(op.to_string());
        if let Some(pos) = rec.faults.iter().position(|(name, _)| name == op) {
            let (_, err) = rec.faults.remove(pos);
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl ControllerClient for MemoryController {
    async fn create_model(&self, name: &str) -> AccessResult<()> {
        self.enter("create_model")?;
        let mut t = self.tables()?;
        if t.models.contains_key(name) {
            return Err(AccessError::Conflict(format!("model {name:?} already exists")));
        }
        t.models.insert(name.to_string(), ModelAccess::new());
        tracing::debug!(model = name, "model created");
        Ok(())
    }

    async fn destroy_model(&self, name: &str) -> AccessResult<()> {
        self.enter("destroy_model")?;
        let mut t = self.tables()?;
        t.models
            .remove(name)
            .ok_or_else(|| AccessError::NotFound(format!("model {name:?}")))?;
        tracing::debug!(model = name, "model destroyed");
        Ok(())
    }

    async fn create_user(&self, name: &str, password: &str) -> AccessResult<()> {
        self.enter("create_user")?;
        let mut t = self.tables()?;
        if t.users.contains_key(name) {
            return Err(AccessError::Conflict(format!("user {name:?} already exists")));
        }
        t.users.insert(
            name.to_string(),
            UserRecord {
                has_password: !password.is_empty(),
            },
        );
        tracing::debug!(user = name, "user created");
        Ok(())
    }

    async fn destroy_user(&self, name: &str) -> AccessResult<()> {
        self.enter("destroy_user")?;
        let mut t = self.tables()?;
        t.users
            .remove(name)
            .ok_or_else(|| AccessError::NotFound(format!("user {name:?}")))?;
        for access in t.models.values_mut() {
            access.remove(name);
        }
        tracing::debug!(user = name, "user destroyed");
        Ok(())
    }

    async fn model_access(&self, model: &str) -> AccessResult<ModelAccess> {
        self.enter("model_access")?;
        let t = self.tables()?;
        t.models
            .get(model)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(format!("model {model:?}")))
    }

    async fn grant_model(&self, model: &str, user: &str, access: AccessLevel) -> AccessResult<()> {
        self.enter("grant_model")?;
        let mut t = self.tables()?;
        if !t.users.contains_key(user) {
            return Err(AccessError::NotFound(format!("user {user:?}")));
        }
        let table = t
            .models
            .get_mut(model)
            .ok_or_else(|| AccessError::NotFound(format!("model {model:?}")))?;

        match table.get(user) {
            Some(current) if !access.includes(current) => Err(AccessError::Conflict(format!(
                "user {user:?} already has {current} access on model {model:?}"
            ))),
            _ => {
                table.insert(user.to_string(), access);
                Ok(())
            }
        }
    }

    async fn revoke_model(
        &self,
        model: &str,
        user: &str,
        access: AccessLevel,
    ) -> AccessResult<()> {
        self.enter("revoke_model")?;
        let mut t = self.tables()?;
        let table = t
            .models
            .get_mut(model)
            .ok_or_else(|| AccessError::NotFound(format!("model {model:?}")))?;

        match table.get(user) {
            None => Err(AccessError::NotFound(format!(
                "user {user:?} has no access on model {model:?}"
            ))),
            Some(current) if *current != access => Err(AccessError::Conflict(format!(
                "user {user:?} holds {current} access on model {model:?}, not {access}"
            ))),
            Some(_) => {
                table.remove(user);
                Ok(())
            }
        }
    }
}
