//! Subscription gate collaborator.
//!
//! Access control for paid modules lives in another service; this engine
//! only asks a yes/no question. Non-student roles and test sessions bypass
//! the gate entirely (see `engine`).

use anyhow::Result;
use async_trait::async_trait;

/// Boolean access check against the subscription service.
#[async_trait]
pub trait SubscriptionGate: Send + Sync {
    async fn has_access(&self, user_id: &str, module_id: &str) -> Result<bool>;
}

/// Grants everything. Default for development and tests, and for deployments
/// that gate access upstream.
pub struct AllowAllGate;

#[async_trait]
impl SubscriptionGate for AllowAllGate {
    async fn has_access(&self, _user_id: &str, _module_id: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Denies everything; used in tests to exercise the authorization path.
pub struct DenyAllGate;

#[async_trait]
impl SubscriptionGate for DenyAllGate {
    async fn has_access(&self, _user_id: &str, _module_id: &str) -> Result<bool> {
        Ok(false)
    }
}
