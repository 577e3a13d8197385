//! ACP router — registry of in-process agents and the single `send`
//! entry point.
//!
//! Registration hands each agent a fresh 32-byte secret. `send`
//! verifies the sender's signature, enforces the conversation state
//! graph, checks the action against the recipient's capabilities, and
//! runs the handler under a wall-clock timeout. The router re-signs the
//! message with the recipient's secret before delivery, so every
//! message an agent receives verifies against its own secret; responses
//! are signed back to the original sender the same way.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::RngCore;

use orion_domain::trace::TraceEvent;

use crate::message::{AcpMessage, AcpMessageType};
use crate::state::AcpState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error codes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stable error codes carried in `type = error` responses.
pub mod error_code {
    pub const INVALID_SIGNATURE: &str = "invalid_signature";
    pub const UNKNOWN_SENDER: &str = "unknown_sender";
    pub const UNKNOWN_RECIPIENT: &str = "unknown_recipient";
    pub const UNKNOWN_ACTION: &str = "unknown_action";
    pub const INVALID_TRANSITION: &str = "invalid_transition";
    pub const HANDLER_TIMEOUT: &str = "handler_timeout";
    pub const HANDLER_FAILED: &str = "handler_failed";
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An agent's message handler. Returns the response payload; an `Err`
/// becomes a `handler_failed` error response.
#[async_trait::async_trait]
pub trait AcpHandler: Send + Sync {
    async fn handle(&self, msg: &AcpMessage) -> orion_domain::error::Result<serde_json::Value>;
}

struct RegisteredAgent {
    capabilities: Vec<String>,
    handler: Arc<dyn AcpHandler>,
    secret: [u8; 32],
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AcpRouter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AcpRouter {
    /// Read-heavy after startup; writes are confined to registration.
    agents: RwLock<HashMap<String, RegisteredAgent>>,
    /// Conversation key → current state.
    conversations: Mutex<HashMap<String, AcpState>>,
    handler_timeout: Duration,
}

impl AcpRouter {
    pub fn new(handler_timeout_secs: u64) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            conversations: Mutex::new(HashMap::new()),
            handler_timeout: Duration::from_secs(handler_timeout_secs),
        }
    }

    /// Register an agent and return its freshly generated secret. The
    /// agent signs outbound messages with it and verifies everything it
    /// receives against it.
    pub fn register(
        &self,
        agent_id: impl Into<String>,
        capabilities: Vec<String>,
        handler: Arc<dyn AcpHandler>,
    ) -> [u8; 32] {
        let agent_id = agent_id.into();
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);

        tracing::info!(agent_id = %agent_id, capabilities = capabilities.len(), "acp agent registered");
        self.agents.write().insert(
            agent_id,
            RegisteredAgent {
                capabilities,
                handler,
                secret,
            },
        );
        secret
    }

    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn capabilities_of(&self, agent_id: &str) -> Option<Vec<String>> {
        self.agents
            .read()
            .get(agent_id)
            .map(|a| a.capabilities.clone())
    }

    /// Current state of a conversation (`Idle` when unseen).
    pub fn conversation_state(&self, key: &str) -> AcpState {
        self.conversations
            .lock()
            .get(key)
            .copied()
            .unwrap_or(AcpState::Idle)
    }

    // ── send ───────────────────────────────────────────────────────

    /// Route one message and return the signed response. Every failure
    /// mode maps to a distinct `type = error` response; this function
    /// never panics and never propagates handler errors.
    pub async fn send(&self, mut msg: AcpMessage) -> AcpMessage {
        // 1. Verify against the sender's secret.
        let sender_secret = match self.secret_of(&msg.from) {
            Some(s) => s,
            None => {
                return self.error_response(&msg, error_code::UNKNOWN_SENDER, "sender is not registered");
            }
        };
        if !msg.verify(&sender_secret) {
            TraceEvent::AcpRouted {
                from: msg.from.clone(),
                to: msg.to.clone(),
                action: msg.action.clone(),
                outcome: error_code::INVALID_SIGNATURE.into(),
            }
            .emit();
            return self.error_response(&msg, error_code::INVALID_SIGNATURE, "signature mismatch");
        }

        // 2. Resolve the recipient.
        let (recipient_secret, handler, knows_action) = {
            let agents = self.agents.read();
            match agents.get(&msg.to) {
                Some(agent) => (
                    agent.secret,
                    agent.handler.clone(),
                    agent.capabilities.iter().any(|c| c == &msg.action),
                ),
                None => {
                    return self.error_response(
                        &msg,
                        error_code::UNKNOWN_RECIPIENT,
                        "recipient is not registered",
                    );
                }
            }
        };
        if !knows_action {
            return self.error_response(
                &msg,
                error_code::UNKNOWN_ACTION,
                &format!("agent '{}' does not handle action '{}'", msg.to, msg.action),
            );
        }

        // 3. Enforce the conversation state graph.
        let conv_key = msg.conversation_key().to_string();
        {
            let conversations = self.conversations.lock();
            let prev = conversations
                .get(&conv_key)
                .copied()
                .unwrap_or(AcpState::Idle);
            if !prev.can_transition_to(msg.state) {
                drop(conversations);
                return self.error_response(
                    &msg,
                    error_code::INVALID_TRANSITION,
                    &format!("{} -> {} is not allowed", prev.as_str(), msg.state.as_str()),
                );
            }
        }

        // 4. Re-sign for the recipient and dispatch under the timeout.
        msg.sign(&recipient_secret);
        let outcome = tokio::time::timeout(self.handler_timeout, handler.handle(&msg)).await;

        let response = match outcome {
            Ok(Ok(payload)) => {
                self.set_conversation(&conv_key, msg.state);
                let mut resp = AcpMessage {
                    id: uuid::Uuid::new_v4().to_string(),
                    from: msg.to.clone(),
                    to: msg.from.clone(),
                    message_type: AcpMessageType::Response,
                    action: msg.action.clone(),
                    payload,
                    correlation_id: Some(conv_key.clone()),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    signature: String::new(),
                    state: msg.state,
                };
                resp.sign(&sender_secret);
                resp
            }
            Ok(Err(e)) => {
                self.set_conversation(&conv_key, AcpState::Failed);
                self.error_response(&msg, error_code::HANDLER_FAILED, &e.to_string())
            }
            Err(_) => {
                self.set_conversation(&conv_key, AcpState::Failed);
                self.error_response(
                    &msg,
                    error_code::HANDLER_TIMEOUT,
                    &format!("handler exceeded {}s", self.handler_timeout.as_secs()),
                )
            }
        };

        TraceEvent::AcpRouted {
            from: msg.from.clone(),
            to: msg.to.clone(),
            action: msg.action.clone(),
            outcome: match response.message_type {
                AcpMessageType::Error => response.payload["code"]
                    .as_str()
                    .unwrap_or("error")
                    .to_string(),
                _ => "ok".into(),
            },
        }
        .emit();

        response
    }

    // ── Internal ───────────────────────────────────────────────────

    fn secret_of(&self, agent_id: &str) -> Option<[u8; 32]> {
        self.agents.read().get(agent_id).map(|a| a.secret)
    }

    fn set_conversation(&self, key: &str, state: AcpState) {
        self.conversations.lock().insert(key.to_string(), state);
    }

    /// Build a `type = error` response, signed back to the sender when
    /// the sender is known.
    fn error_response(&self, msg: &AcpMessage, code: &str, detail: &str) -> AcpMessage {
        let mut resp = AcpMessage {
            id: uuid::Uuid::new_v4().to_string(),
            from: "acp-router".into(),
            to: msg.from.clone(),
            message_type: AcpMessageType::Error,
            action: msg.action.clone(),
            payload: serde_json::json!({ "code": code, "message": detail }),
            correlation_id: Some(msg.conversation_key().to_string()),
            timestamp: chrono::Utc::now().timestamp_millis(),
            signature: String::new(),
            state: AcpState::Failed,
        };
        if let Some(secret) = self.secret_of(&msg.from) {
            resp.sign(&secret);
        }
        resp
    }
}
