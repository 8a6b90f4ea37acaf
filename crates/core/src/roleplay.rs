//! Role-Play State Machine
//!
//! Governs the phase of a scenario-based session:
//! `Introduction -> Active -> {Completed | ManuallyEnded}`. Transitions are
//! modeled as a pure function over `(phase, event)`; the service applies the
//! result against the store rather than mutating state in place.
//!
//! The stop-keyword scan runs before any provider call, so a learner can
//! always terminate a session even when the external provider is down.

use serde::{Deserialize, Serialize};

/// The role-play phase of a session. Distinct from the session's
/// active/completed status: this is the scripted-dialogue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePlayPhase {
    Introduction,
    Active,
    Completed,
    ManuallyEnded,
}

impl RolePlayPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RolePlayPhase::Completed | RolePlayPhase::ManuallyEnded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RolePlayPhase::Introduction => "introduction",
            RolePlayPhase::Active => "active",
            RolePlayPhase::Completed => "completed",
            RolePlayPhase::ManuallyEnded => "manually_ended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "introduction" => Some(RolePlayPhase::Introduction),
            "active" => Some(RolePlayPhase::Active),
            "completed" => Some(RolePlayPhase::Completed),
            "manually_ended" => Some(RolePlayPhase::ManuallyEnded),
            _ => None,
        }
    }
}

/// Something that can move the state machine.
#[derive(Debug, Clone)]
pub enum PhaseEvent<'a> {
    /// A raw student message; scanned for stop keywords and start triggers.
    StudentMessage(&'a str),
    /// The provider's normalized response carried `session_state=completed`.
    ProviderSignaledComplete,
    /// An explicit end-session call.
    ManualEnd,
}

/// The outcome of applying an event to a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No phase change; continue normal handling.
    Stay,
    /// Move to a new phase.
    Enter(RolePlayPhase),
    /// The phase was already terminal; the event is rejected.
    Rejected,
}

/// Words that terminate a session from any non-terminal phase, matched
/// case-insensitively as substrings anywhere in the message.
pub const STOP_KEYWORDS: &[&str] = &["stop", "end", "finish", "quit", "exit"];

/// Phrases that move Introduction to Active, matched case-insensitively
/// as substrings.
pub const START_TRIGGERS: &[&str] = &[
    "let's start",
    "lets start",
    "begin",
    "i'm ready",
    "im ready",
    "start",
];

/// True if the message contains a stop keyword anywhere, in any case.
pub fn contains_stop_keyword(message: &str) -> bool {
    let lower = message.to_lowercase();
    STOP_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// True if the message contains an introduction start trigger.
pub fn contains_start_trigger(message: &str) -> bool {
    let lower = message.to_lowercase();
    START_TRIGGERS.iter().any(|t| lower.contains(t))
}

impl RolePlayPhase {
    /// Pure transition function. Stop keywords win over everything else,
    /// including the start trigger (stopping must never be blocked).
    pub fn apply(self, event: PhaseEvent<'_>) -> Transition {
        if self.is_terminal() {
            return Transition::Rejected;
        }
        match event {
            PhaseEvent::StudentMessage(text) => {
                if contains_stop_keyword(text) {
                    return Transition::Enter(RolePlayPhase::ManuallyEnded);
                }
                match self {
                    RolePlayPhase::Introduction if contains_start_trigger(text) => {
                        Transition::Enter(RolePlayPhase::Active)
                    }
                    _ => Transition::Stay,
                }
            }
            PhaseEvent::ProviderSignaledComplete => match self {
                RolePlayPhase::Active => Transition::Enter(RolePlayPhase::Completed),
                // Completion signals outside Active are ignored.
                _ => Transition::Stay,
            },
            PhaseEvent::ManualEnd => Transition::Enter(RolePlayPhase::ManuallyEnded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_keyword_is_case_insensitive_substring() {
        assert!(contains_stop_keyword("I want to STOP now"));
        assert!(contains_stop_keyword("please stop the session"));
        assert!(contains_stop_keyword("Quit"));
        assert!(contains_stop_keyword("we are finished")); // contains "finish"
        assert!(!contains_stop_keyword("hello there"));
    }

    #[test]
    fn start_trigger_is_case_insensitive() {
        assert!(contains_start_trigger("Let's Start"));
        assert!(contains_start_trigger("ok, begin!"));
        assert!(!contains_start_trigger("hello"));
    }

    #[test]
    fn introduction_advances_on_trigger() {
        let t = RolePlayPhase::Introduction.apply(PhaseEvent::StudentMessage("Let's start"));
        assert_eq!(t, Transition::Enter(RolePlayPhase::Active));
    }

    #[test]
    fn introduction_holds_without_trigger() {
        let t = RolePlayPhase::Introduction.apply(PhaseEvent::StudentMessage("hello"));
        assert_eq!(t, Transition::Stay);
    }

    #[test]
    fn stop_wins_over_start_trigger() {
        // "stop" and a trigger in the same message must terminate.
        let t = RolePlayPhase::Introduction
            .apply(PhaseEvent::StudentMessage("let's start... no wait, stop"));
        assert_eq!(t, Transition::Enter(RolePlayPhase::ManuallyEnded));
    }

    #[test]
    fn stop_terminates_from_any_non_terminal_phase() {
        for phase in [RolePlayPhase::Introduction, RolePlayPhase::Active] {
            let t = phase.apply(PhaseEvent::StudentMessage("I want to stop now"));
            assert_eq!(t, Transition::Enter(RolePlayPhase::ManuallyEnded));
        }
    }

    #[test]
    fn provider_completion_only_applies_while_active() {
        assert_eq!(
            RolePlayPhase::Active.apply(PhaseEvent::ProviderSignaledComplete),
            Transition::Enter(RolePlayPhase::Completed)
        );
        assert_eq!(
            RolePlayPhase::Introduction.apply(PhaseEvent::ProviderSignaledComplete),
            Transition::Stay
        );
    }

    #[test]
    fn terminal_phases_reject_all_events() {
        for phase in [RolePlayPhase::Completed, RolePlayPhase::ManuallyEnded] {
            assert_eq!(
                phase.apply(PhaseEvent::StudentMessage("hello")),
                Transition::Rejected
            );
            assert_eq!(phase.apply(PhaseEvent::ManualEnd), Transition::Rejected);
        }
    }

    #[test]
    fn phase_serde_uses_snake_case() {
        let json = serde_json::to_string(&RolePlayPhase::ManuallyEnded).unwrap();
        assert_eq!(json, "\"manually_ended\"");
        let parsed: RolePlayPhase = serde_json::from_str("\"introduction\"").unwrap();
        assert_eq!(parsed, RolePlayPhase::Introduction);
    }

    #[test]
    fn parse_round_trips_as_str() {
        for phase in [
            RolePlayPhase::Introduction,
            RolePlayPhase::Active,
            RolePlayPhase::Completed,
            RolePlayPhase::ManuallyEnded,
        ] {
            assert_eq!(RolePlayPhase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(RolePlayPhase::parse("bogus"), None);
    }
}
