//! The Value-of-Information gate.
//!
//! `VoI = P(benefit) · benefit_value − action_cost − disturbance_cost`.
//! P(benefit) starts from the trigger's priority and is adjusted by the
//! predicted context; disturbance grows inside quiet hours and right
//! after the user was active themselves.

use crate::runtime::triggers::{TriggerCandidate, TriggerCategory};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context prediction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Multi-dimensional context snapshot for one candidate.
#[derive(Debug, Clone)]
pub struct VoiContext {
    /// Seconds since the user's last activity (`None` = never seen).
    pub idle_secs: Option<i64>,
    /// Messages from the user in the trailing 24h window.
    pub daily_message_count: usize,
    /// Connected channels able to deliver right now.
    pub connected_channels: usize,
    /// Local hour at the user's configured timezone.
    pub local_hour: u32,
    /// Inside configured quiet hours.
    pub quiet_hours: bool,
    /// Urgency markers observed in recent messages.
    pub urgency_hint: bool,
}

/// Fixed cost of composing and sending one proactive message.
const ACTION_COST: f64 = 0.05;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// compute
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn compute(candidate: &TriggerCandidate, ctx: &VoiContext) -> f64 {
    let p_benefit = p_benefit(candidate, ctx);
    let benefit_value = candidate.category.benefit_value();
    let disturbance = disturbance_cost(ctx);

    p_benefit * benefit_value - ACTION_COST - disturbance
}

fn p_benefit(candidate: &TriggerCandidate, ctx: &VoiContext) -> f64 {
    let mut p = candidate.priority;

    // No reachable transport: nothing to gain.
    if ctx.connected_channels == 0 {
        return 0.0;
    }

    // Frequency: chatty users respond to proactive messages more.
    if ctx.daily_message_count >= 10 {
        p += 0.15;
    } else if ctx.daily_message_count == 0 {
        p -= 0.1;
    }

    // Recency interacts with the category: a follow-up gains from a
    // recent thread, a check-in gains from a long gap.
    match candidate.category {
        TriggerCategory::FollowUp => {
            if ctx.idle_secs.is_some_and(|s| s < 4 * 3_600) {
                p += 0.1;
            }
        }
        TriggerCategory::CheckIn => {
            if ctx.idle_secs.is_some_and(|s| s > 48 * 3_600) {
                p += 0.1;
            }
        }
        TriggerCategory::Brief => {
            if (7..10).contains(&ctx.local_hour) {
                p += 0.1;
            }
        }
    }

    if ctx.urgency_hint {
        p += 0.15;
    }

    p.clamp(0.0, 1.0)
}

fn disturbance_cost(ctx: &VoiContext) -> f64 {
    let mut cost = 0.0;
    if ctx.quiet_hours {
        cost += 0.6;
    }
    // The user just spoke; a proactive ping would step on the thread.
    if ctx.idle_secs.is_some_and(|s| s < 600) {
        cost += 0.2;
    }
    cost
}

/// Quiet-hours check over a possibly midnight-wrapping window.
pub fn in_quiet_hours(local_hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        return false;
    }
    if start < end {
        (start..end).contains(&local_hour)
    } else {
        local_hour >= start || local_hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(category: TriggerCategory, priority: f64) -> TriggerCandidate {
        TriggerCandidate {
            rule: "test",
            user_id: "u".into(),
            category,
            priority,
            message: "hello".into(),
        }
    }

    fn daytime_ctx() -> VoiContext {
        VoiContext {
            idle_secs: Some(30 * 3_600),
            daily_message_count: 5,
            connected_channels: 1,
            local_hour: 14,
            quiet_hours: false,
            urgency_hint: false,
        }
    }

    #[test]
    fn daytime_check_in_clears_the_gate() {
        let voi = compute(&candidate(TriggerCategory::CheckIn, 0.5), &daytime_ctx());
        assert!(voi > 0.3, "got {voi}");
    }

    #[test]
    fn three_am_check_in_is_blocked() {
        // 03:00 with no recent activity must stay under the gate.
        let ctx = VoiContext {
            local_hour: 3,
            quiet_hours: true,
            ..daytime_ctx()
        };
        let voi = compute(&candidate(TriggerCategory::CheckIn, 0.5), &ctx);
        assert!(voi <= 0.3, "got {voi}");
    }

    #[test]
    fn no_channels_means_no_value() {
        let ctx = VoiContext {
            connected_channels: 0,
            ..daytime_ctx()
        };
        let voi = compute(&candidate(TriggerCategory::Brief, 0.9), &ctx);
        assert!(voi < 0.0);
    }

    #[test]
    fn just_active_user_is_not_pinged() {
        let ctx = VoiContext {
            idle_secs: Some(60),
            ..daytime_ctx()
        };
        let voi = compute(&candidate(TriggerCategory::CheckIn, 0.5), &ctx);
        assert!(voi <= 0.3);
    }

    #[test]
    fn morning_brief_peaks_in_the_morning() {
        let morning = VoiContext {
            local_hour: 8,
            ..daytime_ctx()
        };
        let evening = VoiContext {
            local_hour: 20,
            ..daytime_ctx()
        };
        let c = candidate(TriggerCategory::Brief, 0.7);
        assert!(compute(&c, &morning) > compute(&c, &evening));
    }

    #[test]
    fn quiet_hours_wrap_midnight() {
        assert!(in_quiet_hours(23, 22, 8));
        assert!(in_quiet_hours(3, 22, 8));
        assert!(!in_quiet_hours(12, 22, 8));
        assert!(in_quiet_hours(9, 8, 12));
        assert!(!in_quiet_hours(7, 8, 12));
    }
}
