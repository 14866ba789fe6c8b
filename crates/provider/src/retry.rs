//! Bounded retry with exponential backoff for controller calls.
//!
//! Only transient failures (`AccessError::Unavailable`) are retried; every
//! other error is returned on the first attempt.

use crate::{ControllerClient, ModelAccess};
use async_trait::async_trait;
use juju_access_core::error::{AccessError, AccessResult};
use juju_access_core::AccessLevel;
use std::future::Future;
use std::time::Duration;

/// Default max retry attempts after the first call.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubles for each one after.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// Upper bound on any single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Backoff before retry number `attempt` (1-based), capped at 10 s.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY)
    }

    /// Runs `call` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> AccessResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AccessResult<T>>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(self.delay_for(attempt)).await;
            }

            match call().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(op, attempt, error = %e, "transient controller error, retrying");
                }
                Err(e) if e.is_transient() => {
                    return Err(AccessError::Unavailable(format!(
                        "{op}: gave up after {} attempts: {e}",
                        attempt + 1
                    )));
                }
                other => return other,
            }
        }
    }
}

/// A [`ControllerClient`] that runs every call of the inner client under a
/// [`RetryPolicy`].
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: ControllerClient> Retrying<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: ControllerClient> ControllerClient for Retrying<C> {
    async fn create_model(&self, name: &str) -> AccessResult<()> {
        let inner = &self.inner;
        self.policy
            .run("create_model", move || inner.create_model(name))
            .await
    }

    async fn destroy_model(&self, name: &str) -> AccessResult<()> {
        let inner = &self.inner;
        self.policy
            .run("destroy_model", move || inner.destroy_model(name))
            .await
    }

    async fn create_user(&self, name: &str, password: &str) -> AccessResult<()> {
        let inner = &self.inner;
        self.policy
            .run("create_user", move || inner.create_user(name, password))
            .await
    }

    async fn destroy_user(&self, name: &str) -> AccessResult<()> {
        let inner = &self.inner;
        self.policy
            .run("destroy_user", move || inner.destroy_user(name))
            .await
    }

    async fn model_access(&self, model: &str) -> AccessResult<ModelAccess> {
        let inner = &self.inner;
        self.policy
            .run("model_access", move || inner.model_access(model))
            .await
    }

    async fn grant_model(&self, model: &str, user: &str, access: AccessLevel) -> AccessResult<()> {
        let inner = &self.inner;
        self.policy
            .run("grant_model", move || inner.grant_model(model, user, access))
            .await
    }

    async fn revoke_model(
        &self,
        model: &str,
        user: &str,
        access: AccessLevel,
    ) -> AccessResult<()> {
        let inner = &self.inner;
        self.policy
            .run("revoke_model", move || inner.revoke_model(model, user, access))
            .await
    }
}
