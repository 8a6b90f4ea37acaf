//! API and Database Models
//!
//! Data structures for the HTTP surface and for `store` persistence, with
//! `utoipa` annotations for OpenAPI generation. Domain enums (session type,
//! message type, role-play phase, analytics) come from `lingua-core`.

use chrono::{DateTime, Utc};
use lingua_core::roleplay::RolePlayPhase;
use lingua_core::scoring::{EngagementLevel, SessionAnalytics};
use lingua_core::types::{MessageType, SessionType, TurnRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a session. Monotonic: once non-active a session
/// never becomes active again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Paused,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Paused => "paused",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "paused" => Some(SessionStatus::Paused),
            "abandoned" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller role, from the upstream identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(UserRole::Student),
            "teacher" => Some(UserRole::Teacher),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// The authenticated caller, extracted from `x-user-id` / `x-user-role`
/// headers set by the upstream auth middleware.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub role: UserRole,
}

/// Snapshot of learner context taken at session creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SessionContext {
    pub previous_session_count: u32,
    /// CEFR level of the module at session start.
    pub current_level: String,
    pub is_teacher_test: bool,
}

/// One active or historical tutoring conversation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TutorSession {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub owner_id: String,
    pub module_id: String,
    #[schema(value_type = String, example = "practice")]
    pub session_type: SessionType,
    #[schema(value_type = String, example = "active")]
    pub status: SessionStatus,
    pub is_test_session: bool,
    #[schema(value_type = Object)]
    pub analytics: SessionAnalytics,
    pub context: SessionContext,
    /// Role-play phase; `None` for free-form modules.
    #[schema(value_type = Option<String>, example = "introduction")]
    pub phase: Option<RolePlayPhase>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TutorSession {
    /// A fresh active session with default analytics.
    pub fn new(
        owner_id: String,
        module_id: String,
        session_type: SessionType,
        is_test_session: bool,
        context: SessionContext,
        phase: Option<RolePlayPhase>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            module_id,
            session_type,
            status: SessionStatus::Active,
            is_test_session,
            analytics: SessionAnalytics::default(),
            context,
            phase,
            start_time: Utc::now(),
            end_time: None,
        }
    }
}

/// One immutable turn of a session's dialogue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredMessage {
    pub id: i64,
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(value_type = String, example = "student")]
    pub role: TurnRole,
    pub content: String,
    #[schema(value_type = String, example = "text")]
    pub message_type: MessageType,
    /// Open map: input modality, exercise fields, role-play phase signal.
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// --- Request payloads ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionPayload {
    #[schema(example = "restaurant-ordering")]
    pub module_id: String,
    #[schema(value_type = String, example = "practice")]
    pub session_type: SessionType,
}

/// An exercise answer riding along with a message.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExerciseAnswer {
    pub answer: String,
    /// The expected answer, echoed back from the exercise the tutor issued.
    pub expected: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessagePayload {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    pub message: String,
    /// Client-declared type for the student turn; defaults to "text".
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "text")]
    pub message_type: Option<MessageType>,
    /// "text" (default) or "speech" when the browser used voice input.
    #[serde(default)]
    pub input_method: Option<String>,
    #[serde(default)]
    pub exercise_answer: Option<ExerciseAnswer>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EndSessionPayload {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewPayload {
    pub notes: String,
}

/// Pagination and filter parameters for the session list.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListSessionsQuery {
    pub module_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// --- Responses ---

#[derive(Debug, Serialize, ToSchema)]
pub struct StartSessionResponse {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    pub welcome_message: String,
    pub suggestions: Vec<String>,
}

/// Live counters returned with every message response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStats {
    pub total_messages: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub session_score: u32,
}

impl From<&SessionAnalytics> for SessionStats {
    fn from(analytics: &SessionAnalytics) -> Self {
        Self {
            total_messages: analytics.total_messages,
            correct_answers: analytics.correct_answers,
            incorrect_answers: analytics.incorrect_answers,
            session_score: analytics.session_score,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub response: String,
    #[schema(value_type = String, example = "text")]
    pub message_type: MessageType,
    pub suggestions: Vec<String>,
    pub session_stats: SessionStats,
}

/// End-of-session derived summary, also embedded in the archived record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    pub conversation_count: u32,
    pub time_spent_minutes: i64,
    pub vocabulary_used: Vec<String>,
    pub exercise_score: u32,
    pub conversation_score: u32,
    pub total_score: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Percentage of answered exercises that were correct.
    pub accuracy: f64,
    #[schema(value_type = String, example = "medium")]
    pub engagement_level: EngagementLevel,
}

/// How the archived session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Completed,
    ManuallyEnded,
    Abandoned,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Completed => "completed",
            RecordState::ManuallyEnded => "manually_ended",
            RecordState::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(RecordState::Completed),
            "manually_ended" => Some(RecordState::ManuallyEnded),
            "abandoned" => Some(RecordState::Abandoned),
            _ => None,
        }
    }
}

/// Archived end-of-session record for later teacher review. Message and
/// summary content are overwritten on re-archive; the teacher review fields
/// are settable exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionRecord {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    pub owner_id: String,
    pub module_id: String,
    pub module_name: String,
    pub messages: Vec<StoredMessage>,
    pub summary: SessionSummary,
    #[schema(value_type = String, example = "completed")]
    pub session_state: RecordState,
    pub is_module_completed: bool,
    pub teacher_reviewed: bool,
    pub teacher_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub archived_at: DateTime<Utc>,
}

/// List view of a session; messages deliberately excluded.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListItem {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub module_id: String,
    #[schema(value_type = String, example = "practice")]
    pub session_type: SessionType,
    #[schema(value_type = String, example = "completed")]
    pub status: SessionStatus,
    #[schema(value_type = Object)]
    pub analytics: SessionAnalytics,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<TutorSession> for SessionListItem {
    fn from(session: TutorSession) -> Self {
        Self {
            id: session.id,
            module_id: session.module_id,
            session_type: session.session_type,
            status: session.status,
            analytics: session.analytics,
            start_time: session.start_time,
            end_time: session.end_time,
        }
    }
}

/// Detail view: the session plus its full message log.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDetail {
    pub session: TutorSession,
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_round_trips() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::Paused,
            SessionStatus::Abandoned,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("bogus"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Paused.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Abandoned.is_terminal());
    }

    #[test]
    fn new_session_starts_active_with_fresh_id() {
        let a = TutorSession::new(
            "user-1".into(),
            "basic-greetings".into(),
            SessionType::Practice,
            false,
            SessionContext::default(),
            None,
        );
        let b = TutorSession::new(
            "user-1".into(),
            "basic-greetings".into(),
            SessionType::Practice,
            false,
            SessionContext::default(),
            None,
        );
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, SessionStatus::Active);
        assert!(a.end_time.is_none());
        assert_eq!(a.analytics.total_messages, 0);
    }

    #[test]
    fn record_state_serde_is_snake_case() {
        let json = serde_json::to_string(&RecordState::ManuallyEnded).unwrap();
        assert_eq!(json, "\"manually_ended\"");
    }

    #[test]
    fn send_message_payload_defaults() {
        let json = format!(
            r#"{{"session_id": "{}", "message": "hallo"}}"#,
            Uuid::new_v4()
        );
        let payload: SendMessagePayload = serde_json::from_str(&json).unwrap();
        assert!(payload.message_type.is_none());
        assert!(payload.input_method.is_none());
        assert!(payload.exercise_answer.is_none());
    }

    #[test]
    fn stats_derive_from_analytics() {
        let mut analytics = SessionAnalytics::default();
        analytics.total_messages = 7;
        analytics.record_answer(true);
        let stats = SessionStats::from(&analytics);
        assert_eq!(stats.total_messages, 7);
        assert_eq!(stats.correct_answers, 1);
        assert_eq!(stats.session_score, 10);
    }

    #[test]
    fn user_role_parse() {
        assert_eq!(UserRole::parse("teacher"), Some(UserRole::Teacher));
        assert_eq!(UserRole::parse("root"), None);
    }
}
