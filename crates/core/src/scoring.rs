//! Scoring & Analytics Engine
//!
//! Derived metrics over a session's message log: exercise score, conversation
//! engagement score, vocabulary usage, and the end-of-session engagement
//! level. All functions here are pure; the service persists the results.

use serde::{Deserialize, Serialize};

use crate::scenario::VocabularyItem;

/// Points awarded per correct exercise answer.
pub const POINTS_PER_CORRECT: u32 = 10;

/// Per-session counters, persisted with the session and updated on every
/// message. All counters are non-negative by construction; `session_score`
/// is monotonically non-decreasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionAnalytics {
    pub total_messages: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub hints_used: u32,
    pub session_score: u32,
    #[serde(default)]
    pub engagement_level: Option<EngagementLevel>,
}

impl SessionAnalytics {
    /// Records an evaluated exercise answer. Points accrue only on correct
    /// answers, so the score never decreases.
    pub fn record_answer(&mut self, is_correct: bool) {
        if is_correct {
            self.correct_answers += 1;
            self.session_score += POINTS_PER_CORRECT;
        } else {
            self.incorrect_answers += 1;
        }
    }

    /// Fraction of answered exercises that were correct, as a percentage.
    /// Zero when nothing has been answered.
    pub fn accuracy(&self) -> f64 {
        let answered = self.correct_answers + self.incorrect_answers;
        if answered == 0 {
            return 0.0;
        }
        f64::from(self.correct_answers) / f64::from(answered) * 100.0
    }
}

/// Derived classification of how actively the learner participated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

/// Classifies engagement from the message rate. A rate of exactly 2.0
/// messages per minute is medium, not high.
pub fn engagement_level(total_messages: u32, duration_minutes: f64) -> EngagementLevel {
    let rate = f64::from(total_messages) / duration_minutes.max(1.0);
    if rate > 2.0 {
        EngagementLevel::High
    } else if rate > 1.0 {
        EngagementLevel::Medium
    } else {
        EngagementLevel::Low
    }
}

/// Conversation engagement score: each student message counts double, each
/// speech-input message adds one more.
pub fn conversation_score(student_messages: u32, speech_input_messages: u32) -> u32 {
    student_messages * 2 + speech_input_messages
}

/// Distinct scenario vocabulary words that appear (case-insensitively, as
/// substrings) anywhere in the student's messages. Each word counts at most
/// once, so the result never exceeds the whitelist length.
pub fn vocabulary_used<'a>(
    vocabulary: &[VocabularyItem],
    student_contents: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    let haystack = student_contents
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    vocabulary
        .iter()
        .filter(|item| haystack.contains(&item.word.to_lowercase()))
        .map(|item| item.word.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(words: &[&str]) -> Vec<VocabularyItem> {
        words
            .iter()
            .map(|w| VocabularyItem {
                word: (*w).to_string(),
                translation: String::new(),
                category: String::new(),
            })
            .collect()
    }

    #[test]
    fn answers_update_counters_and_score() {
        let mut analytics = SessionAnalytics::default();
        analytics.record_answer(true);
        analytics.record_answer(false);
        analytics.record_answer(true);
        assert_eq!(analytics.correct_answers, 2);
        assert_eq!(analytics.incorrect_answers, 1);
        assert_eq!(analytics.session_score, 2 * POINTS_PER_CORRECT);
    }

    #[test]
    fn score_is_monotone_non_decreasing() {
        let mut analytics = SessionAnalytics::default();
        let mut last = 0;
        for is_correct in [true, false, false, true, true, false] {
            analytics.record_answer(is_correct);
            assert!(analytics.session_score >= last);
            last = analytics.session_score;
        }
    }

    #[test]
    fn accuracy_handles_zero_answers() {
        let analytics = SessionAnalytics::default();
        assert_eq!(analytics.accuracy(), 0.0);
    }

    #[test]
    fn accuracy_is_percentage() {
        let mut analytics = SessionAnalytics::default();
        analytics.record_answer(true);
        analytics.record_answer(true);
        analytics.record_answer(false);
        analytics.record_answer(false);
        assert_eq!(analytics.accuracy(), 50.0);
    }

    #[test]
    fn engagement_boundary_two_is_medium() {
        // 20 messages in 10 minutes: rate exactly 2.0.
        assert_eq!(engagement_level(20, 10.0), EngagementLevel::Medium);
        assert_eq!(engagement_level(21, 10.0), EngagementLevel::High);
        assert_eq!(engagement_level(10, 10.0), EngagementLevel::Low);
        assert_eq!(engagement_level(11, 10.0), EngagementLevel::Medium);
    }

    #[test]
    fn engagement_clamps_short_sessions_to_one_minute() {
        // Duration clamps to 1 minute, so 3 messages in 6 seconds rate as
        // 3 per minute, not 30.
        assert_eq!(engagement_level(3, 0.1), EngagementLevel::High);
        assert_eq!(engagement_level(2, 0.1), EngagementLevel::Medium);
        assert_eq!(engagement_level(1, 0.1), EngagementLevel::Low);
    }

    #[test]
    fn conversation_score_weights_speech() {
        assert_eq!(conversation_score(5, 2), 12);
        assert_eq!(conversation_score(0, 0), 0);
    }

    #[test]
    fn vocabulary_counts_each_word_once() {
        let vocab = vocab(&["Wasser", "Rechnung"]);
        let messages = ["ein WASSER bitte", "noch ein wasser", "die rechnung bitte"];
        let used = vocabulary_used(&vocab, messages.iter().copied());
        assert_eq!(used, vec!["Wasser".to_string(), "Rechnung".to_string()]);
    }

    #[test]
    fn vocabulary_never_exceeds_whitelist() {
        let vocab = vocab(&["a", "b"]);
        let messages = ["aaaa bbbb abab"];
        let used = vocabulary_used(&vocab, messages.iter().copied());
        assert!(used.len() <= vocab.len());
    }

    #[test]
    fn vocabulary_matches_substrings() {
        let vocab = vocab(&["bestellen"]);
        let messages = ["ich möchte etwas bestellen, bitte"];
        assert_eq!(vocabulary_used(&vocab, messages.iter().copied()).len(), 1);
    }

    #[test]
    fn engagement_level_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&EngagementLevel::High).unwrap(),
            "\"high\""
        );
    }
}
