//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no async or I/O dependencies.

pub mod error;
pub mod id;
pub mod types;

pub use error::{AccessError, AccessResult};
pub use id::ImportId;
pub use types::{AccessGrant, AccessLevel, AccessModelConfig, GrantState};
