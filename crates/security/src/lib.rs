//! The security chain: pattern filter → affordance check → tool guard →
//! dual-agent review → output scanner.
//!
//! Each stage is non-fatal. Operational errors fail open on the input
//! path; any detected policy hit fails closed.

pub mod affordance;
pub mod guard;
pub mod patterns;
pub mod review;
pub mod scanner;

use std::sync::Arc;

use orion_domain::config::SecurityConfig;
use orion_domain::trace::TraceEvent;
use orion_engines::Orchestrator;

pub use affordance::{AffordanceCheck, AffordanceVerdict};
pub use guard::{GuardVerdict, ToolGuard};
pub use patterns::{PatternFilter, PatternVerdict};
pub use review::{DualReview, ReviewVerdict, RiskLevel};
pub use scanner::{OutputScanner, ScanOutcome};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound verdict
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Combined result of the inbound stages (pattern + affordance).
#[derive(Debug, Clone)]
pub struct InboundVerdict {
    pub allowed: bool,
    /// Input with any matched patterns replaced by `[BLOCKED]`.
    pub sanitized: String,
    /// The stage that blocked, when blocked.
    pub blocked_by: Option<&'static str>,
    pub reason: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SecurityChain
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns all five stages. Constructed once at startup and shared.
pub struct SecurityChain {
    pub patterns: PatternFilter,
    pub affordance: AffordanceCheck,
    pub guard: ToolGuard,
    pub review: DualReview,
    pub scanner: OutputScanner,
}

impl SecurityChain {
    pub fn new(cfg: &SecurityConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            patterns: PatternFilter::new(),
            affordance: AffordanceCheck::new(cfg.affordance.clone(), orchestrator.clone()),
            guard: ToolGuard::new(&cfg.guard),
            review: DualReview::new(cfg.review.clone(), orchestrator),
            scanner: OutputScanner::new(),
        }
    }

    /// Inbound text path: pattern filter always runs; the affordance
    /// check runs only on pattern-safe input.
    pub async fn check_inbound(&self, text: &str) -> InboundVerdict {
        let pattern = self.patterns.check(text);
        if !pattern.safe {
            TraceEvent::SecurityBlocked {
                stage: "pattern_filter".into(),
                reason: pattern.reason.clone().unwrap_or_default(),
            }
            .emit();
            return InboundVerdict {
                allowed: false,
                sanitized: pattern.sanitized,
                blocked_by: Some("pattern_filter"),
                reason: pattern.reason,
            };
        }

        let affordance = self.affordance.assess(&pattern.sanitized).await;
        if affordance.should_block {
            TraceEvent::SecurityBlocked {
                stage: "affordance".into(),
                reason: affordance.category.clone(),
            }
            .emit();
            return InboundVerdict {
                allowed: false,
                sanitized: pattern.sanitized,
                blocked_by: Some("affordance"),
                reason: Some(affordance.category),
            };
        }

        InboundVerdict {
            allowed: true,
            sanitized: pattern.sanitized,
            blocked_by: None,
            reason: None,
        }
    }
}
