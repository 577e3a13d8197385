//! The proactive loop: adaptive heartbeat → trigger evaluation → VoI
//! gate → transport send.
//!
//! Single task, non-overlapping ticks. The interval adapts to user
//! activity and backs off while nothing worth sending accumulates.

use chrono::Timelike;

use orion_domain::event::BusEvent;
use orion_domain::trace::TraceEvent;

use crate::runtime::triggers::{TriggerEvaluator, UserSnapshot};
use crate::runtime::voi::{self, VoiContext};
use crate::state::HostContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HeartbeatLoop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HeartbeatLoop {
    ctx: HostContext,
    evaluator: TriggerEvaluator,
    timezone: chrono_tz::Tz,
    tick: u64,
    consecutive_skips: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub candidates: usize,
    pub sent: usize,
}

impl HeartbeatLoop {
    pub fn new(ctx: HostContext) -> Self {
        let timezone = ctx
            .config
            .heartbeat
            .timezone
            .parse::<chrono_tz::Tz>()
            .unwrap_or_else(|_| {
                tracing::warn!(
                    timezone = %ctx.config.heartbeat.timezone,
                    "invalid heartbeat timezone, using UTC"
                );
                chrono_tz::UTC
            });
        Self {
            ctx,
            evaluator: TriggerEvaluator::new(),
            timezone,
            tick: 0,
            consecutive_skips: 0,
        }
    }

    /// Run forever. Ticks never overlap: a tick that overruns its slot
    /// causes the next beat to be skipped entirely.
    pub async fn run(mut self) {
        if !self.ctx.config.heartbeat.enabled {
            tracing::info!("heartbeat disabled by config");
            return;
        }
        loop {
            let interval = self.current_interval();
            let scheduled = tokio::time::Instant::now() + interval;

            let report = self.tick_once().await;
            if report.sent == 0 {
                self.consecutive_skips = self.consecutive_skips.saturating_add(1);
            } else {
                self.consecutive_skips = 0;
            }

            if tokio::time::Instant::now() >= scheduled {
                tracing::warn!(tick = self.tick, "heartbeat tick overran its interval, skipping a beat");
                tokio::time::sleep_until(scheduled + interval).await;
            } else {
                tokio::time::sleep_until(scheduled).await;
            }
        }
    }

    /// The adaptive interval: activity-recent → short, steady-state →
    /// normal, long-idle → long; multiplied by the backoff for every
    /// consecutive silent tick, capped.
    pub fn current_interval(&self) -> std::time::Duration {
        let hb = &self.ctx.config.heartbeat;
        let now = chrono::Utc::now();

        let most_recent_idle_secs = self
            .ctx
            .channels
            .sessions
            .user_ids()
            .iter()
            .filter_map(|user| self.ctx.channels.sessions.last_activity(user))
            .map(|at| (now - at).num_seconds().max(0) as u64)
            .min();

        let base = match most_recent_idle_secs {
            Some(idle) if idle <= hb.recent_activity_secs => hb.active_interval_secs,
            Some(idle) if idle <= hb.inactive_after_secs => hb.normal_interval_secs,
            _ => hb.inactive_interval_secs,
        };

        let backed_off =
            (base as f64 * hb.backoff_factor.powi(self.consecutive_skips as i32)) as u64;
        std::time::Duration::from_secs(backed_off.min(hb.max_interval_secs))
    }

    /// One tick: heartbeat event, trigger rules, context prediction,
    /// VoI gate, send.
    pub async fn tick_once(&mut self) -> TickReport {
        self.tick += 1;
        let hb = &self.ctx.config.heartbeat;
        self.ctx.bus.publish(BusEvent::Heartbeat {
            tick: self.tick,
            interval_secs: self.current_interval().as_secs(),
        });

        let now_local = chrono::Utc::now().with_timezone(&self.timezone);
        let local_hour = now_local.hour();
        let quiet = voi::in_quiet_hours(local_hour, hb.quiet_start_hour, hb.quiet_end_hour);
        let connected = self.ctx.channels.connected().len();

        let mut report = TickReport::default();
        for user_id in self.ctx.channels.sessions.user_ids() {
            let last_activity = self.ctx.channels.sessions.last_activity(&user_id);
            let snapshot = UserSnapshot {
                user_id: user_id.clone(),
                last_activity,
                local_hour,
            };

            for candidate in self.evaluator.evaluate(&snapshot) {
                report.candidates += 1;

                let window_len: usize = self
                    .ctx
                    .channels
                    .sessions
                    .channel_activity(&user_id)
                    .iter()
                    .map(|(channel, _)| {
                        self.ctx.channels.sessions.window(&user_id, channel).len()
                    })
                    .sum();
                let voi_ctx = VoiContext {
                    idle_secs: last_activity
                        .map(|at| (chrono::Utc::now() - at).num_seconds()),
                    daily_message_count: window_len,
                    connected_channels: connected,
                    local_hour,
                    quiet_hours: quiet,
                    urgency_hint: false,
                };
                let score = voi::compute(&candidate, &voi_ctx);

                // Sandbox permission: proactive sends must be enabled
                // and a transport must exist.
                let permitted = hb.enabled && connected > 0;
                let acted_on = score > hb.voi_threshold && permitted;

                if acted_on {
                    let delivered = self
                        .ctx
                        .channels
                        .send(&candidate.user_id, &candidate.message)
                        .await;
                    if delivered.is_some() {
                        report.sent += 1;
                        self.evaluator.mark_fired(candidate.rule, &candidate.user_id);
                    }
                }

                self.ctx.bus.publish(BusEvent::TriggerFired {
                    rule: candidate.rule.into(),
                    user_id: candidate.user_id.clone(),
                    voi: score,
                    acted_on,
                });
                if !acted_on {
                    tracing::debug!(
                        rule = candidate.rule,
                        user_id = %candidate.user_id,
                        voi = score,
                        "trigger below VoI threshold, not sent"
                    );
                }
            }
        }

        TraceEvent::HeartbeatTick {
            tick: self.tick,
            candidates: report.candidates,
            sent: report.sent,
        }
        .emit();
        report
    }
}
