//! Device pairing: short-lived numeric codes traded for long-lived
//! bearer tokens.
//!
//! The raw token is returned to the caller exactly once; only its
//! SHA-256 digest is stored. Validation compares digests in constant
//! time and throttles repeated failures per client prefix.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use orion_domain::config::PairingConfig;
use orion_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct PairingSession {
    user_id: String,
    channel: String,
    expires_at: chrono::DateTime<chrono::Utc>,
    used: bool,
}

/// A paired device. The raw token never appears here.
#[derive(Debug, Clone)]
pub struct DeviceToken {
    /// Hex-encoded SHA-256 of the raw token.
    pub token_hash: String,
    pub user_id: String,
    pub channel: String,
    pub device_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_used: Option<chrono::DateTime<chrono::Utc>>,
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PairingStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PairingStore {
    cfg: PairingConfig,
    codes: Mutex<HashMap<String, PairingSession>>,
    tokens: Mutex<Vec<DeviceToken>>,
    /// Failure timestamps per client prefix.
    failures: Mutex<HashMap<String, VecDeque<chrono::DateTime<chrono::Utc>>>>,
}

impl PairingStore {
    pub fn new(cfg: PairingConfig) -> Self {
        Self {
            cfg,
            codes: Mutex::new(HashMap::new()),
            tokens: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    // ── Code generation ────────────────────────────────────────────

    /// Issue a 6-digit single-use code bound to `(user, channel)`.
    pub fn generate_code(&self, user_id: &str, channel: &str) -> String {
        let mut codes = self.codes.lock();
        // Drop expired codes while we hold the lock.
        let now = chrono::Utc::now();
        codes.retain(|_, s| s.expires_at > now && !s.used);

        let code = loop {
            let candidate = format!("{:06}", rand::rngs::OsRng.next_u32() % 1_000_000);
            if !codes.contains_key(&candidate) {
                break candidate;
            }
        };
        codes.insert(
            code.clone(),
            PairingSession {
                user_id: user_id.to_string(),
                channel: channel.to_string(),
                expires_at: now + chrono::Duration::seconds(self.cfg.code_ttl_secs as i64),
                used: false,
            },
        );
        code
    }

    // ── Confirmation ───────────────────────────────────────────────

    /// Trade a live code for a raw 64-byte token (returned as 128 hex
    /// chars). The code is consumed atomically: a second confirm with
    /// the same code returns `None`.
    pub fn confirm(&self, code: &str, device_name: &str) -> Option<String> {
        let session = {
            let mut codes = self.codes.lock();
            let session = codes.get_mut(code)?;
            if session.used || session.expires_at <= chrono::Utc::now() {
                return None;
            }
            session.used = true;
            session.clone()
        };

        let mut raw = [0u8; 64];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        let token = hex::encode(raw);
        let token_hash = hex::encode(Sha256::digest(token.as_bytes()));

        self.tokens.lock().push(DeviceToken {
            token_hash,
            user_id: session.user_id.clone(),
            channel: session.channel.clone(),
            device_name: device_name.to_string(),
            created_at: chrono::Utc::now(),
            last_used: None,
            revoked_at: None,
        });

        TraceEvent::PairingConfirmed {
            user_id: session.user_id,
            channel: session.channel,
        }
        .emit();

        Some(token)
    }

    // ── Validation ─────────────────────────────────────────────────

    /// Validate a raw token. `client_id` feeds the failure throttle
    /// (keyed by its first 8 chars). Returns the owning
    /// `(user_id, channel)` for a live, unrevoked token.
    pub fn validate(&self, token: &str, client_id: &str) -> Option<(String, String)> {
        let prefix = client_prefix(client_id);
        if self.is_throttled(&prefix) {
            tracing::warn!(client = %prefix, "token validation throttled");
            return None;
        }

        let provided_hash = hex::encode(Sha256::digest(token.as_bytes()));
        let mut tokens = self.tokens.lock();
        // Walk every row with a constant-time digest compare so a miss
        // costs the same as a hit.
        let mut found: Option<&mut DeviceToken> = None;
        for row in tokens.iter_mut() {
            let matches: bool = row
                .token_hash
                .as_bytes()
                .ct_eq(provided_hash.as_bytes())
                .into();
            if matches && found.is_none() {
                found = Some(row);
            }
        }

        match found {
            Some(row) if row.revoked_at.is_none() => {
                row.last_used = Some(chrono::Utc::now());
                Some((row.user_id.clone(), row.channel.clone()))
            }
            _ => {
                drop(tokens);
                self.record_failure(&prefix);
                None
            }
        }
    }

    /// Revoke a token by its raw value. Validation rejects it from the
    /// next call on.
    pub fn revoke(&self, token: &str) -> bool {
        let provided_hash = hex::encode(Sha256::digest(token.as_bytes()));
        let mut tokens = self.tokens.lock();
        for row in tokens.iter_mut() {
            let matches: bool = row
                .token_hash
                .as_bytes()
                .ct_eq(provided_hash.as_bytes())
                .into();
            if matches && row.revoked_at.is_none() {
                row.revoked_at = Some(chrono::Utc::now());
                return true;
            }
        }
        false
    }

    pub fn token_count(&self) -> usize {
        self.tokens.lock().len()
    }

    // ── Throttle ───────────────────────────────────────────────────

    fn is_throttled(&self, prefix: &str) -> bool {
        let cutoff =
            chrono::Utc::now() - chrono::Duration::seconds(self.cfg.throttle_window_secs as i64);
        let mut failures = self.failures.lock();
        if let Some(window) = failures.get_mut(prefix) {
            while window.front().is_some_and(|t| *t < cutoff) {
                window.pop_front();
            }
            window.len() >= self.cfg.throttle_max_failures as usize
        } else {
            false
        }
    }

    fn record_failure(&self, prefix: &str) {
        self.failures
            .lock()
            .entry(prefix.to_string())
            .or_default()
            .push_back(chrono::Utc::now());
    }
}

fn client_prefix(client_id: &str) -> String {
    client_id.chars().take(8).collect()
}
