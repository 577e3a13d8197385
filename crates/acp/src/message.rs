//! ACP wire format and signing.
//!
//! `signature = hex(hmac_sha256(secret, "id:from:to:action:timestamp"))`
//! with the timestamp in unix milliseconds. Verification compares the
//! recomputed hex digest in constant time.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::state::AcpState;

type HmacSha256 = Hmac<Sha256>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcpMessageType {
    Request,
    Response,
    Event,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcpMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: AcpMessageType,
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Unix milliseconds; part of the signed payload.
    pub timestamp: i64,
    #[serde(default)]
    pub signature: String,
    pub state: AcpState,
}

impl AcpMessage {
    /// Build an unsigned request opening (or continuing) a conversation.
    pub fn request(
        from: impl Into<String>,
        to: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
        state: AcpState,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            message_type: AcpMessageType::Request,
            action: action.into(),
            payload,
            correlation_id: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
            signature: String::new(),
            state,
        }
    }

    /// Continue an existing conversation under its correlation id.
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// The canonical byte string covered by the signature.
    pub fn signing_payload(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.id, self.from, self.to, self.action, self.timestamp
        )
    }

    /// Sign in place with the given secret.
    pub fn sign(&mut self, secret: &[u8]) {
        self.signature = compute_signature(&self.signing_payload(), secret);
    }

    /// Constant-time signature verification.
    pub fn verify(&self, secret: &[u8]) -> bool {
        let expected = compute_signature(&self.signing_payload(), secret);
        expected
            .as_bytes()
            .ct_eq(self.signature.as_bytes())
            .into()
    }

    /// The conversation key: the correlation id when present, else the
    /// message's own id (which then becomes the correlation id for
    /// follow-ups).
    pub fn conversation_key(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or(&self.id)
    }
}

fn compute_signature(payload: &str, secret: &[u8]) -> String {
    // HmacSha256::new_from_slice accepts any key length.
    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> AcpMessage {
        AcpMessage::request(
            "alice",
            "bob",
            "chat",
            serde_json::json!({"text": "hello"}),
            AcpState::Requested,
        )
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let secret = b"super-secret-key";
        let mut m = msg();
        m.sign(secret);
        assert!(m.verify(secret));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let mut m = msg();
        m.sign(b"key-one");
        assert!(!m.verify(b"key-two"));
    }

    #[test]
    fn verify_rejects_tampered_fields() {
        let secret = b"key";
        let mut m = msg();
        m.sign(secret);
        m.action = "delete_everything".into();
        assert!(!m.verify(secret));
    }

    #[test]
    fn verify_rejects_empty_signature() {
        let m = msg();
        assert!(!m.verify(b"key"));
    }

    #[test]
    fn conversation_key_prefers_correlation_id() {
        let m = msg();
        assert_eq!(m.conversation_key(), m.id);
        let m2 = msg().with_correlation("conv-1");
        assert_eq!(m2.conversation_key(), "conv-1");
    }

    #[test]
    fn wire_format_uses_type_tag() {
        let mut m = msg();
        m.sign(b"k");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "request");
        assert_eq!(json["state"], "requested");
        assert!(json["signature"].as_str().unwrap().len() == 64);
    }
}
