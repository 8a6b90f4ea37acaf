//! Dialogue Orchestrator & Session Archiver
//!
//! Drives a session turn by turn: the stop-keyword short circuit, the
//! role-play introduction gate, provider calls through the silent-fallback
//! router, analytics updates, and the end-of-session archive snapshot.
//! All state transitions come from the pure state machine in
//! `lingua_core::roleplay` and are applied against the store.

use chrono::{DateTime, Utc};
use lingua_core::catalog::{LearningModule, ModuleCatalog};
use lingua_core::prompt;
use lingua_core::provider::{LanguageProvider, TutorContext};
use lingua_core::roleplay::{self, PhaseEvent, RolePlayPhase, Transition};
use lingua_core::scoring;
use lingua_core::types::{HistoryTurn, MessageType, TurnRole};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::TeacherTestScope;
use crate::gate::SubscriptionGate;
use crate::locks::SessionLocks;
use crate::models::{
    EndSessionPayload, Identity, MessageResponse, RecordState, SendMessagePayload, SessionContext,
    SessionDetail, SessionListItem, SessionRecord, SessionStats, SessionStatus, SessionSummary,
    StartSessionPayload, StartSessionResponse, StoredMessage, TutorSession, UserRole,
};
use crate::store::{SessionStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("session is not active")]
    SessionNotActive,
    #[error("teacher review already recorded")]
    ReviewAlreadySet,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => EngineError::NotFound("session not found".to_string()),
            StoreError::SessionNotActive => EngineError::SessionNotActive,
            StoreError::ReviewAlreadySet => EngineError::ReviewAlreadySet,
            other => EngineError::Internal(other.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Elapsed whole minutes between two instants, rounded.
fn elapsed_minutes(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (((now - start).num_milliseconds()) as f64 / 60_000.0).round() as i64
}

/// The tutoring session engine: every HTTP operation lands here.
pub struct SessionEngine {
    store: SessionStore,
    catalog: Arc<dyn ModuleCatalog>,
    provider: Arc<dyn LanguageProvider>,
    gate: Arc<dyn SubscriptionGate>,
    locks: SessionLocks,
    teacher_test_scope: TeacherTestScope,
}

impl SessionEngine {
    pub fn new(
        store: SessionStore,
        catalog: Arc<dyn ModuleCatalog>,
        provider: Arc<dyn LanguageProvider>,
        gate: Arc<dyn SubscriptionGate>,
        teacher_test_scope: TeacherTestScope,
    ) -> Self {
        Self {
            store,
            catalog,
            provider,
            gate,
            locks: SessionLocks::new(),
            teacher_test_scope,
        }
    }

    async fn lookup_module(&self, module_id: &str) -> Result<LearningModule> {
        let module = self
            .catalog
            .get_module(module_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| {
                EngineError::NotFound(format!("module '{}' not found or inactive", module_id))
            })?;
        Ok(module)
    }

    /// Opens a session. `is_test` marks teacher test runs, which bypass the
    /// subscription gate but are restricted by role and, depending on
    /// configuration, to the module's author.
    pub async fn start_session(
        &self,
        identity: &Identity,
        payload: StartSessionPayload,
        is_test: bool,
    ) -> Result<StartSessionResponse> {
        let module_id = payload.module_id.trim();
        if module_id.is_empty() || module_id.len() > 128 {
            return Err(EngineError::Validation("malformed module id".to_string()));
        }

        let module = self.lookup_module(module_id).await?;

        if is_test {
            match identity.role {
                UserRole::Teacher => {
                    if self.teacher_test_scope == TeacherTestScope::CreatorOnly
                        && module.created_by != identity.user_id
                    {
                        return Err(EngineError::Forbidden(
                            "only the module's author may test it".to_string(),
                        ));
                    }
                }
                UserRole::Admin => {}
                UserRole::Student => {
                    return Err(EngineError::Forbidden(
                        "test sessions require a teacher role".to_string(),
                    ));
                }
            }
        } else if identity.role == UserRole::Student {
            let allowed = self
                .gate
                .has_access(&identity.user_id, &module.id)
                .await
                .map_err(EngineError::Internal)?;
            if !allowed {
                return Err(EngineError::Forbidden(
                    "subscription required for this module".to_string(),
                ));
            }
        }

        let previous_session_count = self
            .store
            .count_sessions(&identity.user_id, &module.id)
            .await?;
        let context = SessionContext {
            previous_session_count,
            current_level: module.level.clone(),
            is_teacher_test: is_test,
        };
        let phase = module.scenario.as_ref().map(|_| RolePlayPhase::Introduction);

        let mut session = TutorSession::new(
            identity.user_id.clone(),
            module.id.clone(),
            payload.session_type,
            is_test,
            context,
            phase,
        );
        self.store.create_session(&session).await?;

        let (welcome_message, message_type, metadata, suggestions) = match &module.scenario {
            Some(scenario) => (
                scenario.framing_text(),
                MessageType::RolePlayIntro,
                serde_json::json!({ "session_state": "introduction" }),
                vec!["Let's start".to_string()],
            ),
            None => {
                let mut suggestions: Vec<String> =
                    module.tutor.helpful_phrases.iter().take(3).cloned().collect();
                if suggestions.is_empty() {
                    suggestions.push("Can you give me an example?".to_string());
                }
                (
                    format!(
                        "Welcome to {}! I'm your {} tutor. What would you like to work on today?",
                        module.name, module.language
                    ),
                    MessageType::Text,
                    serde_json::json!({}),
                    suggestions,
                )
            }
        };

        self.store
            .append_message(
                session.id,
                TurnRole::Tutor,
                message_type,
                &welcome_message,
                metadata,
            )
            .await?;
        session.analytics.total_messages += 1;
        self.store
            .update_analytics(session.id, &session.analytics)
            .await?;

        info!(
            session_id = %session.id,
            module_id = %module.id,
            session_type = %payload.session_type,
            is_test,
            "session started"
        );

        Ok(StartSessionResponse {
            session_id: session.id,
            welcome_message,
            suggestions,
        })
    }

    /// Handles one student message end to end.
    pub async fn handle_message(
        &self,
        identity: &Identity,
        payload: SendMessagePayload,
    ) -> Result<MessageResponse> {
        if payload.message.trim().is_empty() {
            return Err(EngineError::Validation("message must not be empty".to_string()));
        }

        let _guard = self.locks.acquire(payload.session_id).await;

        let mut session = self
            .store
            .find_active(payload.session_id, &identity.user_id)
            .await?;
        let module = self.lookup_module(&session.module_id).await?;

        let input_method = payload.input_method.as_deref().unwrap_or("text");
        self.store
            .append_message(
                session.id,
                TurnRole::Student,
                payload.message_type.unwrap_or(MessageType::Text),
                &payload.message,
                serde_json::json!({ "input_method": input_method }),
            )
            .await?;
        session.analytics.total_messages += 1;

        // Stop keywords terminate before any provider call, so ending works
        // even with the provider down.
        let effective_phase = session
            .phase
            .unwrap_or(RolePlayPhase::Active);
        if let Transition::Enter(RolePlayPhase::ManuallyEnded) =
            effective_phase.apply(PhaseEvent::StudentMessage(&payload.message))
        {
            return self.manual_end(&mut session, &module).await;
        }

        // Introduction gate: no scenario generation until the start trigger.
        if let (Some(scenario), Some(RolePlayPhase::Introduction)) =
            (&module.scenario, session.phase)
        {
            let (content, message_type, metadata, suggestions) =
                if roleplay::contains_start_trigger(&payload.message) {
                    self.store
                        .set_phase(session.id, RolePlayPhase::Active)
                        .await?;
                    let suggestions = scenario
                        .conversation_flow
                        .first()
                        .map(|stage| stage.expected_responses.clone())
                        .unwrap_or_default();
                    (
                        scenario.opening_line(),
                        MessageType::RolePlayActive,
                        serde_json::json!({ "session_state": "active" }),
                        suggestions,
                    )
                } else {
                    (
                        scenario.framing_text(),
                        MessageType::RolePlayIntro,
                        serde_json::json!({ "session_state": "introduction" }),
                        vec!["Let's start".to_string()],
                    )
                };

            self.store
                .append_message(session.id, TurnRole::Tutor, message_type, &content, metadata)
                .await?;
            session.analytics.total_messages += 1;
            self.store
                .update_analytics(session.id, &session.analytics)
                .await?;

            return Ok(MessageResponse {
                response: content,
                message_type,
                suggestions,
                session_stats: SessionStats::from(&session.analytics),
            });
        }

        let ctx = self.tutor_context(&module, &session).await?;

        // Exercise answers are evaluated instead of generated over.
        if let Some(exercise) = &payload.exercise_answer {
            let eval = self
                .provider
                .evaluate_answer(&exercise.answer, &exercise.expected, &ctx)
                .await
                .map_err(EngineError::Internal)?;
            session.analytics.record_answer(eval.is_correct);

            let message_type = if eval.is_correct {
                MessageType::Feedback
            } else {
                MessageType::Correction
            };
            let metadata = serde_json::json!({
                "exercise": {
                    "answer": exercise.answer,
                    "expected": exercise.expected,
                    "is_correct": eval.is_correct,
                }
            });
            self.store
                .append_message(session.id, TurnRole::Tutor, message_type, &eval.feedback, metadata)
                .await?;
            session.analytics.total_messages += 1;
            self.store
                .update_analytics(session.id, &session.analytics)
                .await?;

            return Ok(MessageResponse {
                response: eval.feedback,
                message_type,
                suggestions: Vec::new(),
                session_stats: SessionStats::from(&session.analytics),
            });
        }

        let normalized = self
            .provider
            .generate_response(&payload.message, &ctx)
            .await
            .map_err(EngineError::Internal)?;

        let metadata = match normalized.session_state {
            Some(state) => serde_json::json!({ "session_state": state.as_str() }),
            None => serde_json::json!({}),
        };
        self.store
            .append_message(
                session.id,
                TurnRole::Tutor,
                normalized.message_type,
                &normalized.content,
                metadata,
            )
            .await?;
        session.analytics.total_messages += 1;
        if normalized.message_type == MessageType::Hint {
            session.analytics.hints_used += 1;
        }

        // Role-play completion comes only from the provider's explicit
        // session_state field, and only while Active.
        let completed = matches!(
            (session.phase, normalized.session_state),
            (Some(RolePlayPhase::Active), Some(RolePlayPhase::Completed))
        );
        if completed {
            self.store
                .set_phase(session.id, RolePlayPhase::Completed)
                .await?;
            let now = Utc::now();
            session.analytics.engagement_level = Some(scoring::engagement_level(
                session.analytics.total_messages,
                elapsed_minutes(session.start_time, now) as f64,
            ));
            self.store
                .set_status(session.id, SessionStatus::Completed, now)
                .await?;
            self.archive(&session, &module, RecordState::Completed, now).await?;
            self.locks.release(session.id).await;
            info!(session_id = %session.id, "role-play completed, module marked complete");
        }
        self.store
            .update_analytics(session.id, &session.analytics)
            .await?;

        Ok(MessageResponse {
            response: normalized.content,
            message_type: normalized.message_type,
            suggestions: normalized.suggestions,
            session_stats: SessionStats::from(&session.analytics),
        })
    }

    /// Stop-keyword termination: deterministic template, no provider call.
    async fn manual_end(
        &self,
        session: &mut TutorSession,
        module: &LearningModule,
    ) -> Result<MessageResponse> {
        let now = Utc::now();
        let minutes = elapsed_minutes(session.start_time, now);
        let (situation, student_role) = match &module.scenario {
            Some(s) => (s.situation.clone(), s.student_role.clone()),
            None => ("language practice".to_string(), "student".to_string()),
        };

        let content = format!(
            "Thanks for practicing! We wrapped up \"{situation}\" — you played the {student_role}. \
             Time spent: {minutes} minutes. Totals: {total} messages, {correct} correct and \
             {incorrect} incorrect answers, score {score}.",
            total = session.analytics.total_messages + 1,
            correct = session.analytics.correct_answers,
            incorrect = session.analytics.incorrect_answers,
            score = session.analytics.session_score,
        );

        self.store
            .append_message(
                session.id,
                TurnRole::Tutor,
                MessageType::RolePlayComplete,
                &content,
                serde_json::json!({ "session_state": "manually_ended" }),
            )
            .await?;
        session.analytics.total_messages += 1;
        session.analytics.engagement_level = Some(scoring::engagement_level(
            session.analytics.total_messages,
            minutes as f64,
        ));

        if session.phase.is_some() {
            self.store
                .set_phase(session.id, RolePlayPhase::ManuallyEnded)
                .await?;
        }
        self.store
            .set_status(session.id, SessionStatus::Completed, now)
            .await?;
        self.store
            .update_analytics(session.id, &session.analytics)
            .await?;
        self.archive(session, module, RecordState::ManuallyEnded, now).await?;
        self.locks.release(session.id).await;

        info!(session_id = %session.id, "session manually ended by stop keyword");

        Ok(MessageResponse {
            response: content,
            message_type: MessageType::RolePlayComplete,
            suggestions: Vec::new(),
            session_stats: SessionStats::from(&session.analytics),
        })
    }

    /// Ends a session explicitly. Idempotent: re-ending recomputes the
    /// archived summary but never resurrects or double-terminates.
    ///
    /// Deliberately does not take the per-session lock: `handle_message`
    /// holds it across the provider await, and ending must never wait out an
    /// in-flight provider call. The SQL status guard keeps the termination
    /// monotonic, and message ordering is owned by the store.
    pub async fn end_session(
        &self,
        identity: &Identity,
        payload: EndSessionPayload,
    ) -> Result<SessionSummary> {
        let mut session = self
            .store
            .fetch_session(payload.session_id, &identity.user_id)
            .await?;
        let module = self.lookup_module(&session.module_id).await?;

        let now = Utc::now();
        if session.status == SessionStatus::Active {
            if let Some(phase) = session.phase {
                if !phase.is_terminal() {
                    self.store
                        .set_phase(session.id, RolePlayPhase::ManuallyEnded)
                        .await?;
                    session.phase = Some(RolePlayPhase::ManuallyEnded);
                }
            }
            self.store
                .set_status(session.id, SessionStatus::Completed, now)
                .await?;
            session.status = SessionStatus::Completed;
        }

        let record_state = match session.phase {
            Some(RolePlayPhase::Completed) => RecordState::Completed,
            _ => RecordState::ManuallyEnded,
        };
        let summary = self.archive(&session, &module, record_state, now).await?;
        self.locks.release(session.id).await;

        info!(session_id = %session.id, state = record_state.as_str(), "session ended");
        Ok(summary)
    }

    /// Builds the summary and upserts the archived record. The duration is
    /// always recomputed from the original start time.
    async fn archive(
        &self,
        session: &TutorSession,
        module: &LearningModule,
        record_state: RecordState,
        now: DateTime<Utc>,
    ) -> Result<SessionSummary> {
        let messages = self.store.messages_for(session.id).await?;
        let summary = build_summary(session, module, &messages, now);

        let record = SessionRecord {
            session_id: session.id,
            owner_id: session.owner_id.clone(),
            module_id: module.id.clone(),
            module_name: module.name.clone(),
            messages,
            summary: summary.clone(),
            session_state: record_state,
            is_module_completed: record_state == RecordState::Completed,
            teacher_reviewed: false,
            teacher_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            archived_at: now,
        };
        self.store.upsert_record(&record).await?;
        Ok(summary)
    }

    pub async fn list_sessions(
        &self,
        identity: &Identity,
        module_id: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Vec<SessionListItem>> {
        let sessions = self
            .store
            .list_sessions(
                &identity.user_id,
                module_id,
                page.max(1),
                limit.clamp(1, 100),
            )
            .await?;
        Ok(sessions.into_iter().map(SessionListItem::from).collect())
    }

    pub async fn get_session(&self, identity: &Identity, session_id: Uuid) -> Result<SessionDetail> {
        let session = self
            .store
            .fetch_session(session_id, &identity.user_id)
            .await?;
        let messages = self.store.messages_for(session_id).await?;
        Ok(SessionDetail { session, messages })
    }

    /// Records the teacher review on an archived session, once.
    pub async fn review_session(
        &self,
        identity: &Identity,
        session_id: Uuid,
        notes: &str,
    ) -> Result<SessionRecord> {
        if identity.role == UserRole::Student {
            return Err(EngineError::Forbidden(
                "reviews require a teacher role".to_string(),
            ));
        }
        self.store
            .set_review(session_id, &identity.user_id, notes)
            .await?;
        let record = self
            .store
            .get_record(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("archived session not found".to_string()))?;
        Ok(record)
    }

    async fn tutor_context(
        &self,
        module: &LearningModule,
        session: &TutorSession,
    ) -> Result<TutorContext> {
        let history = self
            .store
            .messages_for(session.id)
            .await?
            .into_iter()
            .map(|m| HistoryTurn {
                role: m.role,
                content: m.content,
            })
            .collect();
        Ok(TutorContext {
            session_type: session.session_type,
            phase: session.phase,
            system_prompt: prompt::system_prompt(module, session.session_type),
            history,
        })
    }
}

fn build_summary(
    session: &TutorSession,
    module: &LearningModule,
    messages: &[StoredMessage],
    now: DateTime<Utc>,
) -> SessionSummary {
    let minutes = elapsed_minutes(session.start_time, now);

    let student_messages: Vec<&StoredMessage> = messages
        .iter()
        .filter(|m| m.role == TurnRole::Student)
        .collect();
    let speech_count = student_messages
        .iter()
        .filter(|m| m.metadata.get("input_method").and_then(|v| v.as_str()) == Some("speech"))
        .count() as u32;

    let vocabulary_used = match &module.scenario {
        Some(scenario) => scoring::vocabulary_used(
            &scenario.vocabulary,
            student_messages.iter().map(|m| m.content.as_str()),
        ),
        None => Vec::new(),
    };

    let conversation_score =
        scoring::conversation_score(student_messages.len() as u32, speech_count);
    let exercise_score = session.analytics.session_score;

    SessionSummary {
        conversation_count: messages.len() as u32,
        time_spent_minutes: minutes,
        vocabulary_used,
        exercise_score,
        conversation_score,
        total_score: exercise_score + conversation_score,
        correct_answers: session.analytics.correct_answers,
        incorrect_answers: session.analytics.incorrect_answers,
        accuracy: session.analytics.accuracy(),
        engagement_level: scoring::engagement_level(messages.len() as u32, minutes as f64),
    }
}
