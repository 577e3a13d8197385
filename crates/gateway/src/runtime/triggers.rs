//! Trigger rules for the proactive loop.
//!
//! Each rule looks at a user's recent activity and may propose one
//! candidate message with a category and a base priority. The VoI gate
//! decides whether anything actually sends.

use std::collections::HashMap;

use parking_lot::Mutex;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerCategory {
    CheckIn,
    Brief,
    FollowUp,
}

impl TriggerCategory {
    /// Relative value of a delivered message of this kind.
    pub fn benefit_value(&self) -> f64 {
        match self {
            TriggerCategory::CheckIn => 0.8,
            TriggerCategory::Brief => 1.0,
            TriggerCategory::FollowUp => 0.9,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerCandidate {
    pub rule: &'static str,
    pub user_id: String,
    pub category: TriggerCategory,
    /// Base priority ∈ [0, 1]; feeds P(benefit).
    pub priority: f64,
    pub message: String,
}

/// Inputs a rule evaluation sees for one user.
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub user_id: String,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
    pub local_hour: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TriggerEvaluator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TriggerEvaluator {
    /// `(rule, user)` → last fire date, so daily rules fire once.
    last_fired: Mutex<HashMap<(&'static str, String), chrono::NaiveDate>>,
}

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self {
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate every rule for one user.
    pub fn evaluate(&self, snapshot: &UserSnapshot) -> Vec<TriggerCandidate> {
        let mut candidates = Vec::new();
        let now = chrono::Utc::now();

        // Inactivity check-in: quiet for more than a day.
        if let Some(last) = snapshot.last_activity {
            if now - last > chrono::Duration::hours(24)
                && self.once_per_day("check-in", snapshot)
            {
                candidates.push(TriggerCandidate {
                    rule: "check-in",
                    user_id: snapshot.user_id.clone(),
                    category: TriggerCategory::CheckIn,
                    priority: 0.5,
                    message: "It's been a while — anything I can help you pick back up?".into(),
                });
            }
        }

        // Morning brief: once per day inside the morning window, only
        // for users we've actually seen.
        if snapshot.last_activity.is_some()
            && (7..10).contains(&snapshot.local_hour)
            && self.once_per_day("morning-brief", snapshot)
        {
            candidates.push(TriggerCandidate {
                rule: "morning-brief",
                user_id: snapshot.user_id.clone(),
                category: TriggerCategory::Brief,
                priority: 0.7,
                message: "Morning. Want a quick rundown of today before you start?".into(),
            });
        }

        // Follow-up: activity earlier today that went quiet mid-flow.
        if let Some(last) = snapshot.last_activity {
            let gap = now - last;
            if gap > chrono::Duration::hours(2)
                && gap < chrono::Duration::hours(8)
                && self.once_per_day("follow-up", snapshot)
            {
                candidates.push(TriggerCandidate {
                    rule: "follow-up",
                    user_id: snapshot.user_id.clone(),
                    category: TriggerCategory::FollowUp,
                    priority: 0.6,
                    message: "Still thinking about what we discussed earlier — want me to keep going?"
                        .into(),
                });
            }
        }

        candidates
    }

    /// Mark a rule as fired so the day-gate holds.
    pub fn mark_fired(&self, rule: &'static str, user_id: &str) {
        self.last_fired.lock().insert(
            (rule, user_id.to_string()),
            chrono::Utc::now().date_naive(),
        );
    }

    fn once_per_day(&self, rule: &'static str, snapshot: &UserSnapshot) -> bool {
        let today = chrono::Utc::now().date_naive();
        self.last_fired
            .lock()
            .get(&(rule, snapshot.user_id.clone()))
            .map(|date| *date != today)
            .unwrap_or(true)
    }
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(hours_ago: i64, local_hour: u32) -> UserSnapshot {
        UserSnapshot {
            user_id: "u".into(),
            last_activity: Some(chrono::Utc::now() - chrono::Duration::hours(hours_ago)),
            local_hour,
        }
    }

    #[test]
    fn long_idle_proposes_check_in() {
        let eval = TriggerEvaluator::new();
        let candidates = eval.evaluate(&snapshot(30, 14));
        assert!(candidates.iter().any(|c| c.rule == "check-in"));
    }

    #[test]
    fn active_user_gets_no_check_in() {
        let eval = TriggerEvaluator::new();
        let candidates = eval.evaluate(&snapshot(1, 14));
        assert!(!candidates.iter().any(|c| c.rule == "check-in"));
    }

    #[test]
    fn morning_brief_only_in_window() {
        let eval = TriggerEvaluator::new();
        assert!(eval
            .evaluate(&snapshot(1, 8))
            .iter()
            .any(|c| c.rule == "morning-brief"));
        assert!(!eval
            .evaluate(&snapshot(1, 15))
            .iter()
            .any(|c| c.rule == "morning-brief"));
    }

    #[test]
    fn fired_rule_holds_for_the_day() {
        let eval = TriggerEvaluator::new();
        let snap = snapshot(1, 8);
        assert!(eval.evaluate(&snap).iter().any(|c| c.rule == "morning-brief"));
        eval.mark_fired("morning-brief", "u");
        assert!(!eval.evaluate(&snap).iter().any(|c| c.rule == "morning-brief"));
    }

    #[test]
    fn mid_gap_proposes_follow_up() {
        let eval = TriggerEvaluator::new();
        let candidates = eval.evaluate(&snapshot(3, 14));
        assert!(candidates.iter().any(|c| c.rule == "follow-up"));
    }

    #[test]
    fn unseen_user_proposes_nothing() {
        let eval = TriggerEvaluator::new();
        let candidates = eval.evaluate(&UserSnapshot {
            user_id: "ghost".into(),
            last_activity: None,
            local_hour: 8,
        });
        assert!(candidates.is_empty());
    }
}
