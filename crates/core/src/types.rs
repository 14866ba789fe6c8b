//! Domain types for the model access resource.

use crate::error::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Access level
// ---------------------------------------------------------------------------

/// Permission tier a user holds on a model.
///
/// Ordered `Read < Write < Admin`; a higher level includes every lower one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 3] = [AccessLevel::Read, AccessLevel::Write, AccessLevel::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        }
    }

    /// True if holding `self` grants at least the permissions of `other`.
    pub fn includes(&self, other: &AccessLevel) -> bool {
        self >= other
    }
}

impl FromStr for AccessLevel {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            "admin" => Ok(AccessLevel::Admin),
            _ => Err(AccessError::InvalidAccess(s.to_string())),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Configuration block
// ---------------------------------------------------------------------------

/// The declarative block exactly as written by the operator.
///
/// `access` stays a raw string here so that an unknown level is reported by
/// validation rather than by the JSON parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessModelConfig {
    pub access: String,
    pub model: String,
    pub users: Vec<String>,
}

impl AccessModelConfig {
    pub fn new(
        model: impl Into<String>,
        access: impl Into<String>,
        users: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            access: access.into(),
            model: model.into(),
            users: users.into_iter().map(Into::into).collect(),
        }
    }

    /// Checks the block and produces a typed [`AccessGrant`]. Performs no I/O.
    pub fn validate(&self) -> AccessResult<AccessGrant> {
        let access: AccessLevel = self.access.parse()?;
        AccessGrant::new(&self.model, access, self.users.iter().cloned())
    }
}

// ---------------------------------------------------------------------------
// Grant
// ---------------------------------------------------------------------------

/// A validated desired grant: `access` on `model` for every user in `users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub model: String,
    pub access: AccessLevel,
    pub users: BTreeSet<String>,
}

impl AccessGrant {
    pub fn new(
        model: impl Into<String>,
        access: AccessLevel,
        users: impl IntoIterator<Item = String>,
    ) -> AccessResult<Self> {
        let model = model.into();
        check_name("model", &model)?;

        let users: BTreeSet<String> = users.into_iter().collect();
        if users.is_empty() {
            return Err(AccessError::InvalidConfig(
                "users must contain at least one user".into(),
            ));
        }
        for user in &users {
            check_name("user", user)?;
            if user.contains(',') {
                return Err(AccessError::InvalidConfig(format!(
                    "user name {user:?} must not contain ','"
                )));
            }
        }

        Ok(Self {
            model,
            access,
            users,
        })
    }

    /// Resource identity: `model:access:user[,user...]`, users sorted.
    pub fn id(&self) -> String {
        format_id(&self.model, self.access, &self.users)
    }
}

fn check_name(kind: &str, name: &str) -> AccessResult<()> {
    if name.is_empty() {
        return Err(AccessError::InvalidConfig(format!(
            "{kind} name must not be empty"
        )));
    }
    if name.contains(':') {
        return Err(AccessError::InvalidConfig(format!(
            "{kind} name {name:?} must not contain ':'"
        )));
    }
    Ok(())
}

pub(crate) fn format_id(model: &str, access: AccessLevel, users: &BTreeSet<String>) -> String {
    let users: Vec<&str> = users.iter().map(String::as_str).collect();
    format!("{}:{}:{}", model, access, users.join(","))
}

// ---------------------------------------------------------------------------
// Observed state
// ---------------------------------------------------------------------------

/// The resource's persisted state: what the controller was last seen to hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantState {
    pub id: String,
    pub model: String,
    pub access: AccessLevel,
    pub users: BTreeSet<String>,
}

impl GrantState {
    pub fn new(model: impl Into<String>, access: AccessLevel, users: BTreeSet<String>) -> Self {
        let model = model.into();
        Self {
            id: format_id(&model, access, &users),
            model,
            access,
            users,
        }
    }

    /// The grant this state represents, for diffing against a desired grant.
    pub fn as_grant(&self) -> AccessGrant {
        AccessGrant {
            model: self.model.clone(),
            access: self.access,
            users: self.users.clone(),
        }
    }

    /// True when `model`, `access`, and `users` all match `grant`.
    pub fn matches(&self, grant: &AccessGrant) -> bool {
        self.model == grant.model && self.access == grant.access && self.users == grant.users
    }
}

impl From<&AccessGrant> for GrantState {
    fn from(grant: &AccessGrant) -> Self {
        GrantState::new(grant.model.clone(), grant.access, grant.users.clone())
    }
}
