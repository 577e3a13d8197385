//! Loop detector — one instance per supervisor run, consulted before
//! every call and fed after every call.
//!
//! Three patterns: identical calls (3 warn / 5 break), no progress
//! inside a sliding window, and A→B→A→B ping-pong.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use orion_domain::config::LoopDetectorConfig;
use orion_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct CallRecord {
    tool: String,
    param_hash: String,
    at: Instant,
    produced_progress: bool,
}

/// Signal attached to an observed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopSignal {
    Ok,
    Warn(&'static str),
    Break(&'static str),
}

pub const PATTERN_IDENTICAL: &str = "identical-calls";
pub const PATTERN_NO_PROGRESS: &str = "no-progress";
pub const PATTERN_PING_PONG: &str = "ping-pong";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LoopDetector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LoopDetector {
    cfg: LoopDetectorConfig,
    records: Mutex<VecDeque<CallRecord>>,
}

impl LoopDetector {
    pub fn new(cfg: LoopDetectorConfig) -> Self {
        Self {
            cfg,
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Hash tool parameters canonically (serde_json keeps map order
    /// stable for identical values).
    pub fn hash_params(params: &serde_json::Value) -> String {
        let canonical = params.to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Would issuing this call trip the breaker? Checked *before* the
    /// call so the breaking call is never made.
    pub fn would_break(&self, tool: &str, param_hash: &str) -> Option<&'static str> {
        let records = self.records.lock();

        // Identical calls: the trailing run of (tool, hash).
        let run = records
            .iter()
            .rev()
            .take_while(|r| r.tool == tool && r.param_hash == param_hash)
            .count();
        if run >= self.cfg.identical_break {
            return Some(PATTERN_IDENTICAL);
        }

        // No progress inside the window.
        let window = std::time::Duration::from_secs(self.cfg.no_progress_window_secs);
        let now = Instant::now();
        let stalled = records
            .iter()
            .filter(|r| now.duration_since(r.at) <= window && !r.produced_progress)
            .count();
        if stalled >= self.cfg.no_progress_threshold {
            return Some(PATTERN_NO_PROGRESS);
        }

        // Ping-pong across the last N calls, including the candidate.
        if self.is_ping_pong(&records, tool, param_hash) {
            return Some(PATTERN_PING_PONG);
        }

        None
    }

    /// Record a completed call. Returns a warn signal when the
    /// identical-call count reaches the warning threshold.
    pub fn observe(&self, tool: &str, param_hash: &str, produced_progress: bool) -> LoopSignal {
        let mut records = self.records.lock();
        records.push_back(CallRecord {
            tool: tool.to_string(),
            param_hash: param_hash.to_string(),
            at: Instant::now(),
            produced_progress,
        });
        // Keep a bounded history; patterns only need the recent tail.
        while records.len() > 64 {
            records.pop_front();
        }

        let run = records
            .iter()
            .rev()
            .take_while(|r| r.tool == tool && r.param_hash == param_hash)
            .count();
        if run >= self.cfg.identical_break {
            TraceEvent::LoopBreak {
                pattern: PATTERN_IDENTICAL.into(),
                tool: tool.into(),
            }
            .emit();
            LoopSignal::Break(PATTERN_IDENTICAL)
        } else if run >= self.cfg.identical_warn {
            tracing::warn!(tool = %tool, run, "repeated identical tool call");
            LoopSignal::Warn(PATTERN_IDENTICAL)
        } else {
            LoopSignal::Ok
        }
    }

    /// A→B→A→B with at least the configured number of alternations
    /// across the examined window.
    fn is_ping_pong(&self, records: &VecDeque<CallRecord>, tool: &str, param_hash: &str) -> bool {
        let window = self.cfg.ping_pong_window;
        if window < 2 || records.len() + 1 < window {
            return false;
        }
        let mut keys: Vec<(String, String)> = records
            .iter()
            .rev()
            .take(window - 1)
            .map(|r| (r.tool.clone(), r.param_hash.clone()))
            .collect();
        keys.reverse();
        keys.push((tool.to_string(), param_hash.to_string()));

        let distinct: std::collections::HashSet<&(String, String)> = keys.iter().collect();
        if distinct.len() != 2 {
            return false;
        }
        let alternations = keys.windows(2).filter(|pair| pair[0] != pair[1]).count();
        alternations >= self.cfg.ping_pong_alternations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> LoopDetector {
        LoopDetector::new(LoopDetectorConfig::default())
    }

    #[test]
    fn five_identical_calls_block_the_sixth() {
        let d = detector();
        let hash = LoopDetector::hash_params(&json!({"q": "same"}));

        for i in 0..5 {
            assert!(
                d.would_break("search", &hash).is_none(),
                "call {} should still be issued",
                i + 1
            );
            let signal = d.observe("search", &hash, true);
            if i + 1 >= 5 {
                assert_eq!(signal, LoopSignal::Break(PATTERN_IDENTICAL));
            } else if i + 1 >= 3 {
                assert_eq!(signal, LoopSignal::Warn(PATTERN_IDENTICAL));
            } else {
                assert_eq!(signal, LoopSignal::Ok);
            }
        }

        // The sixth call must not be issued.
        assert_eq!(d.would_break("search", &hash), Some(PATTERN_IDENTICAL));
    }

    #[test]
    fn different_params_reset_the_identical_run() {
        let d = detector();
        let a = LoopDetector::hash_params(&json!({"page": 1}));
        let b = LoopDetector::hash_params(&json!({"page": 2}));
        for _ in 0..4 {
            d.observe("search", &a, true);
        }
        d.observe("search", &b, true);
        assert!(d.would_break("search", &a).is_none());
    }

    #[test]
    fn no_progress_window_breaks() {
        let d = detector();
        for i in 0..5 {
            let hash = LoopDetector::hash_params(&json!({"attempt": i}));
            d.observe("probe", &hash, false);
        }
        let next = LoopDetector::hash_params(&json!({"attempt": 99}));
        assert_eq!(d.would_break("probe", &next), Some(PATTERN_NO_PROGRESS));
    }

    #[test]
    fn progress_clears_the_stall_count() {
        let d = detector();
        for i in 0..4 {
            let hash = LoopDetector::hash_params(&json!({"attempt": i}));
            d.observe("probe", &hash, false);
        }
        d.observe("probe", "fresh", true);
        assert!(d.would_break("probe", "next").is_none());
    }

    #[test]
    fn ping_pong_detected() {
        let d = detector();
        let a = LoopDetector::hash_params(&json!({"side": "a"}));
        let b = LoopDetector::hash_params(&json!({"side": "b"}));
        // A B A B A observed; the next B completes the pattern.
        for i in 0..5 {
            let (tool, hash) = if i % 2 == 0 { ("a", &a) } else { ("b", &b) };
            d.observe(tool, hash, true);
        }
        assert_eq!(d.would_break("b", &b), Some(PATTERN_PING_PONG));
    }

    #[test]
    fn three_distinct_tools_are_not_ping_pong() {
        let d = detector();
        for (tool, n) in [("a", 1), ("b", 2), ("c", 3), ("a", 4), ("b", 5)] {
            let hash = LoopDetector::hash_params(&json!({ "n": n }));
            d.observe(tool, &hash, true);
        }
        let hash = LoopDetector::hash_params(&json!({"n": 6}));
        assert!(d.would_break("c", &hash).is_none());
    }

    #[test]
    fn hash_is_stable_and_param_sensitive() {
        let a1 = LoopDetector::hash_params(&json!({"x": 1}));
        let a2 = LoopDetector::hash_params(&json!({"x": 1}));
        let b = LoopDetector::hash_params(&json!({"x": 2}));
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }
}
