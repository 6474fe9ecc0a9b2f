//! Response gate — decides whether a message deserves a reply at all.
//!
//! Chats carry plenty of "ok", "👍" and "thanks" that need no answer. A reply
//! is produced only for greetings, questions, or messages that arrive while a
//! conversation is still active.

use chrono::{DateTime, Duration, Utc};
use parley_config::PolicyConfig;
use regex_lite::Regex;

/// Why the gate let a message through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    Greeting,
    Question,
    FollowUp,
}

/// Largest window `chrono::Duration` can hold without overflow.
const MAX_WINDOW_SECS: u64 = i64::MAX as u64 / 1000;

#[derive(Debug, Clone)]
pub struct ResponseGate {
    greetings: Option<Regex>,
    questions: Option<Regex>,
    follow_up_window: Duration,
}

/// Case-insensitive, word-bounded alternation of `words`; `None` when empty.
fn word_pattern(words: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex_lite::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
}

impl ResponseGate {
    pub fn new(greetings: &[String], questions: &[String], follow_up_window: Duration) -> Self {
        Self {
            greetings: word_pattern(greetings),
            questions: word_pattern(questions),
            follow_up_window,
        }
    }

    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self::new(
            &policy.greetings,
            &policy.question_keywords,
            Duration::seconds(policy.follow_up_window_secs.min(MAX_WINDOW_SECS) as i64),
        )
    }

    /// The first rule that admits `text`, or `None` if it should be ignored.
    pub fn evaluate(
        &self,
        text: &str,
        last_interaction_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<GateReason> {
        if self.greetings.as_ref().is_some_and(|re| re.is_match(text)) {
            return Some(GateReason::Greeting);
        }

        if text.trim_end().ends_with('?')
            || self.questions.as_ref().is_some_and(|re| re.is_match(text))
        {
            return Some(GateReason::Question);
        }

        match last_interaction_at {
            Some(last) if now.signed_duration_since(last) < self.follow_up_window => {
                Some(GateReason::FollowUp)
            }
            _ => None,
        }
    }

    pub fn should_respond(
        &self,
        text: &str,
        last_interaction_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.evaluate(text, last_interaction_at, now).is_some()
    }
}

impl Default for ResponseGate {
    fn default() -> Self {
        Self::from_policy(&PolicyConfig::default())
    }
}
