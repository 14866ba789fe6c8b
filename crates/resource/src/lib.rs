//! Model access grant resource: validation, diffing, lifecycle, plan/apply
//! engine, plan rendering, and plan sinks.

pub mod diff;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod reporter;
pub mod resource;
pub mod sink;

pub use diff::{diff, Action, Operation, Plan};
pub use engine::{ApplyOutcome, Engine};
pub use error::ApplyError;
pub use lifecycle::{Lifecycle, Phase};
pub use resource::AccessModelResource;
