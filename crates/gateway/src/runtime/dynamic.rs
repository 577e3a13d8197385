//! Session-dynamic context: mood, expertise, topic, and urgency
//! detected from the sanitized inbound text plus the stored profile.
//!
//! Deliberately heuristic — this runs on every turn before the first
//! engine call, so it must cost nothing.

use orion_memory::profile::UserProfile;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Neutral,
    Frustrated,
    Excited,
    Worried,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expertise {
    Casual,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    High,
}

#[derive(Debug, Clone)]
pub struct DynamicContext {
    pub mood: Mood,
    pub expertise: Expertise,
    pub topic: Option<String>,
    pub urgency: Urgency,
}

impl DynamicContext {
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!(
                "Mood: {}",
                match self.mood {
                    Mood::Neutral => "neutral",
                    Mood::Frustrated => "frustrated — be patient and concrete",
                    Mood::Excited => "excited — match the energy",
                    Mood::Worried => "worried — be reassuring and precise",
                }
            ),
            format!(
                "Register: {}",
                match self.expertise {
                    Expertise::Casual => "plain language",
                    Expertise::Technical => "technical detail is welcome",
                }
            ),
        ];
        if let Some(topic) = &self.topic {
            lines.push(format!("Current topic: {topic}"));
        }
        if self.urgency == Urgency::High {
            lines.push("Urgency: high — answer first, elaborate after".into());
        }
        lines.join("\n")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Detection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn detect(text: &str, profile: &UserProfile) -> DynamicContext {
    let lower = text.to_lowercase();

    let mood = if contains_any(
        &lower,
        &["ugh", "frustrat", "annoy", "broken again", "still not", "why won't"],
    ) {
        Mood::Frustrated
    } else if contains_any(&lower, &["worried", "anxious", "scared", "nervous"]) {
        Mood::Worried
    } else if contains_any(&lower, &["awesome", "amazing", "can't wait", "excited", "!!!"]) {
        Mood::Excited
    } else {
        Mood::Neutral
    };

    let expertise = if contains_any(
        &lower,
        &["stack trace", "regex", "compile", "endpoint", "kernel", "dependency", "api", "segfault"],
    ) {
        Expertise::Technical
    } else {
        Expertise::Casual
    };

    let urgency = if contains_any(&lower, &["asap", "urgent", "right now", "immediately", "emergency"]) {
        Urgency::High
    } else {
        Urgency::Normal
    };

    // Topic: prefer a known recurring topic mentioned in the text.
    let topic = profile
        .topics
        .iter()
        .find(|t| lower.contains(&t.to_lowercase()))
        .cloned();

    DynamicContext {
        mood,
        expertise,
        topic,
        urgency,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
