use orion_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel adapter contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every transport adapter implements. Concrete adapters
/// (messaging apps, local shells) live outside this workspace; the
/// manager and the proactive loop only see this interface.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    /// Stable channel identifier used in priority lists and sessions.
    fn id(&self) -> &str;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Deliver a message. `Ok(true)` means the transport accepted it.
    async fn send(&self, user_id: &str, text: &str) -> Result<bool>;

    /// Deliver a message that requires explicit user approval.
    /// `Ok(true)` means the user approved.
    async fn send_with_confirm(&self, user_id: &str, text: &str, prompt: &str) -> Result<bool>;
}
