//! Per-engine health tracking.
//!
//! Each engine keeps a rolling window of `{latency, success}` samples.
//! Status is derived from the window's P50 latency and error rate, with
//! hysteresis on the degraded→healthy edge: both recovery thresholds
//! must hold simultaneously before a degraded engine is trusted again.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use orion_domain::config::HealthConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EngineStatus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// No samples yet.
    Unknown,
    Healthy,
    Degraded,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Unknown => "unknown",
            EngineStatus::Healthy => "healthy",
            EngineStatus::Degraded => "degraded",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HealthTracker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy)]
struct Sample {
    latency_ms: u64,
    success: bool,
}

struct Inner {
    samples: VecDeque<Sample>,
    status: EngineStatus,
    last_used: Option<chrono::DateTime<chrono::Utc>>,
}

/// Read-consistent view of one engine's health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: EngineStatus,
    pub p50_ms: Option<u64>,
    pub error_rate: f64,
    pub samples: usize,
    pub last_used: Option<chrono::DateTime<chrono::Utc>>,
}

/// Rolling-window health stats for a single engine. All reads and
/// updates go through one mutex, so concurrent tasks observe a
/// serializable history.
pub struct HealthTracker {
    cfg: HealthConfig,
    inner: Mutex<Inner>,
}

impl HealthTracker {
    pub fn new(cfg: HealthConfig) -> Self {
        Self {
            cfg,
            inner: Mutex::new(Inner {
                samples: VecDeque::new(),
                status: EngineStatus::Unknown,
                last_used: None,
            }),
        }
    }

    /// Record one call outcome. Returns `Some((from, to))` when the
    /// status crossed a boundary.
    pub fn record(&self, latency_ms: u64, success: bool) -> Option<(EngineStatus, EngineStatus)> {
        let mut inner = self.inner.lock();
        if inner.samples.len() >= self.cfg.window {
            inner.samples.pop_front();
        }
        inner.samples.push_back(Sample {
            latency_ms,
            success,
        });
        inner.last_used = Some(chrono::Utc::now());

        let p50 = percentile_50(&inner.samples);
        let err = error_rate_of(&inner.samples);
        let prev = inner.status;
        let next = next_status(prev, p50, err, &self.cfg);
        inner.status = next;

        (prev != next).then_some((prev, next))
    }

    pub fn status(&self) -> EngineStatus {
        self.inner.lock().status
    }

    pub fn p50_ms(&self) -> Option<u64> {
        let inner = self.inner.lock();
        if inner.samples.is_empty() {
            None
        } else {
            Some(percentile_50(&inner.samples))
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let inner = self.inner.lock();
        HealthSnapshot {
            status: inner.status,
            p50_ms: if inner.samples.is_empty() {
                None
            } else {
                Some(percentile_50(&inner.samples))
            },
            error_rate: error_rate_of(&inner.samples),
            samples: inner.samples.len(),
            last_used: inner.last_used,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status derivation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn next_status(prev: EngineStatus, p50: u64, err: f64, cfg: &HealthConfig) -> EngineStatus {
    let exceeds_degraded = p50 > cfg.degraded_p50_ms || err > cfg.degraded_error_rate;
    let meets_healthy = p50 <= cfg.healthy_p50_ms && err <= cfg.healthy_error_rate;

    match prev {
        EngineStatus::Degraded => {
            // Hysteresis: both recovery thresholds must hold together.
            if meets_healthy {
                EngineStatus::Healthy
            } else {
                EngineStatus::Degraded
            }
        }
        EngineStatus::Healthy => {
            if exceeds_degraded {
                EngineStatus::Degraded
            } else {
                EngineStatus::Healthy
            }
        }
        EngineStatus::Unknown => {
            if exceeds_degraded {
                EngineStatus::Degraded
            } else {
                EngineStatus::Healthy
            }
        }
    }
}

fn percentile_50(samples: &VecDeque<Sample>) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let mut latencies: Vec<u64> = samples.iter().map(|s| s.latency_ms).collect();
    latencies.sort_unstable();
    latencies[latencies.len() / 2]
}

fn error_rate_of(samples: &VecDeque<Sample>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let failures = samples.iter().filter(|s| !s.success).count();
    failures as f64 / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> HealthTracker {
        HealthTracker::new(HealthConfig::default())
    }

    #[test]
    fn unknown_until_first_sample() {
        let t = tracker();
        assert_eq!(t.status(), EngineStatus::Unknown);
        t.record(100, true);
        assert_eq!(t.status(), EngineStatus::Healthy);
    }

    #[test]
    fn degrades_on_high_error_rate() {
        let t = tracker();
        for _ in 0..10 {
            t.record(100, true);
        }
        assert_eq!(t.status(), EngineStatus::Healthy);
        for _ in 0..10 {
            t.record(100, false);
        }
        // 10/20 failures = 0.5 > 0.3
        assert_eq!(t.status(), EngineStatus::Degraded);
    }

    #[test]
    fn degrades_on_slow_p50() {
        let t = tracker();
        for _ in 0..20 {
            t.record(6_000, true);
        }
        assert_eq!(t.status(), EngineStatus::Degraded);
    }

    #[test]
    fn hysteresis_requires_both_recovery_thresholds() {
        let cfg = HealthConfig {
            window: 4,
            ..HealthConfig::default()
        };
        let t = HealthTracker::new(cfg);
        for _ in 0..4 {
            t.record(6_000, false);
        }
        assert_eq!(t.status(), EngineStatus::Degraded);

        // Fast but still failing: p50 recovers, error rate does not.
        for _ in 0..2 {
            t.record(100, false);
        }
        assert_eq!(t.status(), EngineStatus::Degraded);

        // Fast and succeeding: window fills with good samples.
        for _ in 0..4 {
            t.record(100, true);
        }
        assert_eq!(t.status(), EngineStatus::Healthy);
    }

    #[test]
    fn mid_band_keeps_current_status() {
        // P50 between 2.5s and 5s: healthy stays healthy.
        let t = tracker();
        for _ in 0..20 {
            t.record(1_000, true);
        }
        assert_eq!(t.status(), EngineStatus::Healthy);
        for _ in 0..20 {
            t.record(4_000, true);
        }
        assert_eq!(t.status(), EngineStatus::Healthy);
    }

    #[test]
    fn window_is_bounded() {
        let t = tracker();
        for _ in 0..50 {
            t.record(100, true);
        }
        assert_eq!(t.snapshot().samples, 20);
    }

    #[test]
    fn record_reports_flips() {
        let t = tracker();
        let flip = t.record(100, true);
        assert_eq!(
            flip,
            Some((EngineStatus::Unknown, EngineStatus::Healthy))
        );
        assert_eq!(t.record(100, true), None);
    }
}
