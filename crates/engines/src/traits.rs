use orion_domain::chat::ChatMessage;
use orion_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// The user-facing prompt for this call.
    pub prompt: String,
    /// System prompt. `None` lets the adapter choose its default.
    pub system_prompt: Option<String>,
    /// Prior conversation context, oldest first.
    pub context: Vec<ChatMessage>,
    /// Model identifier override. `None` uses the engine's default.
    pub model: Option<String>,
    /// Maximum tokens in the response.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core engine trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every LLM adapter must implement.
///
/// Concrete adapters live outside this workspace; the orchestrator and
/// the rest of the runtime only ever see this interface. An adapter that
/// hits a transport-level failure should return an `Err` — the
/// orchestrator converts that into the empty-string "provider failed"
/// signal its callers are required to handle.
#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    /// Unique engine name (the key used in priority lists).
    fn name(&self) -> &str;

    /// Provider family (used for usage pricing lookups).
    fn provider(&self) -> &str;

    /// Default model identifier, when the adapter has one.
    fn default_model(&self) -> Option<&str> {
        None
    }

    /// Cheap availability probe, called once at registry startup.
    async fn is_available(&self) -> bool;

    /// Generate a completion for the request.
    async fn generate(&self, req: &GenerateRequest) -> Result<String>;
}
