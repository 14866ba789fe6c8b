//! Import identifier parsing.

use crate::error::{AccessError, AccessResult};
use crate::types::{format_id, AccessGrant, AccessLevel};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A parsed `model:access:user` identifier.
///
/// The user field may hold a comma-separated list, which is the form the
/// resource writes for multi-user grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportId {
    pub model: String,
    pub access: AccessLevel,
    pub users: BTreeSet<String>,
}

impl ImportId {
    pub fn parse(id: &str) -> AccessResult<Self> {
        let parse_err = |reason: &str| AccessError::Parse {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = id.split(':').collect();
        if fields.len() != 3 {
            return Err(parse_err("expected <model>:<access>:<user>"));
        }
        if fields.iter().any(|f| f.is_empty()) {
            return Err(parse_err("fields must not be empty"));
        }

        let access: AccessLevel = fields[1]
            .parse()
            .map_err(|e: AccessError| parse_err(&e.to_string()))?;

        let mut users = BTreeSet::new();
        for user in fields[2].split(',') {
            if user.is_empty() {
                return Err(parse_err("user names must not be empty"));
            }
            users.insert(user.to_string());
        }

        Ok(Self {
            model: fields[0].to_string(),
            access,
            users,
        })
    }

    pub fn into_grant(self) -> AccessResult<AccessGrant> {
        AccessGrant::new(self.model, self.access, self.users)
    }
}

impl FromStr for ImportId {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImportId::parse(s)
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_id(&self.model, self.access, &self.users))
    }
}
