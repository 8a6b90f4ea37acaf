//! Shared vocabulary types for the tutoring engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of tutoring session a learner has opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    Practice,
    Assessment,
    Help,
    Conversation,
    Review,
    TeacherTest,
}

impl SessionType {
    /// Wire/database representation, matching the serde rename.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Practice => "practice",
            SessionType::Assessment => "assessment",
            SessionType::Help => "help",
            SessionType::Conversation => "conversation",
            SessionType::Review => "review",
            SessionType::TeacherTest => "teacher-test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "practice" => Some(SessionType::Practice),
            "assessment" => Some(SessionType::Assessment),
            "help" => Some(SessionType::Help),
            "conversation" => Some(SessionType::Conversation),
            "review" => Some(SessionType::Review),
            "teacher-test" => Some(SessionType::TeacherTest),
            _ => None,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single message in the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    Text,
    Exercise,
    Feedback,
    Hint,
    Correction,
    Encouragement,
    RolePlayIntro,
    RolePlayActive,
    RolePlayComplete,
    Conversation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Exercise => "exercise",
            MessageType::Feedback => "feedback",
            MessageType::Hint => "hint",
            MessageType::Correction => "correction",
            MessageType::Encouragement => "encouragement",
            MessageType::RolePlayIntro => "role-play-intro",
            MessageType::RolePlayActive => "role-play-active",
            MessageType::RolePlayComplete => "role-play-complete",
            MessageType::Conversation => "conversation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            "exercise" => Some(MessageType::Exercise),
            "feedback" => Some(MessageType::Feedback),
            "hint" => Some(MessageType::Hint),
            "correction" => Some(MessageType::Correction),
            "encouragement" => Some(MessageType::Encouragement),
            "role-play-intro" => Some(MessageType::RolePlayIntro),
            "role-play-active" => Some(MessageType::RolePlayActive),
            "role-play-complete" => Some(MessageType::RolePlayComplete),
            "conversation" => Some(MessageType::Conversation),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Student,
    Tutor,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::Student => "student",
            TurnRole::Tutor => "tutor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(TurnRole::Student),
            "tutor" => Some(TurnRole::Tutor),
            _ => None,
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prior turn of the conversation, as passed to a provider.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_type_round_trips_kebab_case() {
        let json = serde_json::to_string(&SessionType::TeacherTest).unwrap();
        assert_eq!(json, "\"teacher-test\"");
        let parsed: SessionType = serde_json::from_str("\"practice\"").unwrap();
        assert_eq!(parsed, SessionType::Practice);
    }

    #[test]
    fn message_type_round_trips_kebab_case() {
        let json = serde_json::to_string(&MessageType::RolePlayIntro).unwrap();
        assert_eq!(json, "\"role-play-intro\"");
        let parsed: MessageType = serde_json::from_str("\"role-play-complete\"").unwrap();
        assert_eq!(parsed, MessageType::RolePlayComplete);
    }

    #[test]
    fn as_str_matches_serde_representation() {
        for ty in [
            SessionType::Practice,
            SessionType::Assessment,
            SessionType::Help,
            SessionType::Conversation,
            SessionType::Review,
            SessionType::TeacherTest,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
    }
}
