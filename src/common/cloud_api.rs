use crate::common::errors::Result;
use async_trait::async_trait;
use serde_json::Value;

/// What the station transport needs from an authenticated cloud session.
///
/// Implemented by [`crate::cloud::ArloClient`]; the station side only ever
/// holds it behind an `Arc<dyn CloudApi>` so the session stays the single
/// owner of its tokens.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Cloud user id, present once logged in
    fn user_id(&self) -> Option<&str>;

    /// Authenticated GET under the API host, returning the `data` field
    async fn server_get(&self, path: &str) -> Result<Value>;

    /// Best-effort device command. Never fails, a `false` means "not delivered"
    async fn notify_device(
        &self,
        device_id: &str,
        cloud_id: &str,
        action: &str,
        resource: &str,
        publish: bool,
    ) -> bool;
}
