//! Language-Generation Provider Abstraction
//!
//! A `LanguageProvider` produces tutor responses, answer evaluations, and
//! exercises. Two implementations exist: `OpenAiProvider` (external, only
//! when a credential is configured) and `FallbackProvider` (deterministic,
//! offline). `ProviderRouter` composes them with the silent-fallback policy:
//! any external failure degrades to templated content and is never visible
//! to the caller.

pub mod fallback;
pub mod normalize;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::catalog::LearningModule;
use crate::roleplay::RolePlayPhase;
use crate::types::{HistoryTurn, MessageType, SessionType};

pub use fallback::{Choice, FallbackProvider, FixedChoice, RandomChoice};
pub use openai::OpenAiProvider;

/// Context handed to a provider for a single generation call.
#[derive(Debug, Clone)]
pub struct TutorContext {
    pub session_type: SessionType,
    /// Role-play phase, if the session's module carries a scenario.
    pub phase: Option<RolePlayPhase>,
    /// Fully built system prompt (see `crate::prompt`).
    pub system_prompt: String,
    /// Prior turns, oldest first.
    pub history: Vec<HistoryTurn>,
}

/// A provider response after normalization: always well-formed, regardless of
/// what the provider actually emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub content: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Explicit role-play completion signal from the provider; the engine
    /// never infers completion from free text.
    #[serde(default)]
    pub session_state: Option<RolePlayPhase>,
}

impl NormalizedResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: MessageType::Text,
            suggestions: Vec::new(),
            session_state: None,
        }
    }
}

/// The verdict on a student's exercise answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(alias = "isCorrect")]
    pub is_correct: bool,
    pub feedback: String,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

/// A generated exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub prompt: String,
    pub exercise_type: String,
    pub expected_answer: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Uniform interface over the generation capability.
#[async_trait]
pub trait LanguageProvider: Send + Sync {
    /// Produces the tutor's next turn for a student message.
    async fn generate_response(
        &self,
        message: &str,
        ctx: &TutorContext,
    ) -> Result<NormalizedResponse>;

    /// Judges a student answer against the expected answer.
    async fn evaluate_answer(
        &self,
        student_answer: &str,
        correct_answer: &str,
        ctx: &TutorContext,
    ) -> Result<Evaluation>;

    /// Generates a fresh exercise for a module.
    async fn generate_exercise(
        &self,
        module: &LearningModule,
        difficulty: &str,
        exercise_type: &str,
    ) -> Result<Exercise>;
}

/// Routes each call to the external provider when one is configured,
/// substituting fallback output on any error. Router methods themselves
/// never fail: the fallback is infallible by construction.
pub struct ProviderRouter {
    external: Option<Arc<dyn LanguageProvider>>,
    fallback: FallbackProvider,
}

impl ProviderRouter {
    pub fn new(external: Option<Arc<dyn LanguageProvider>>, fallback: FallbackProvider) -> Self {
        Self { external, fallback }
    }

    /// A router with no external provider; all calls hit the fallback.
    pub fn fallback_only(fallback: FallbackProvider) -> Self {
        Self::new(None, fallback)
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }
}

#[async_trait]
impl LanguageProvider for ProviderRouter {
    async fn generate_response(
        &self,
        message: &str,
        ctx: &TutorContext,
    ) -> Result<NormalizedResponse> {
        if let Some(external) = &self.external {
            match external.generate_response(message, ctx).await {
                Ok(response) => return Ok(response),
                Err(e) => warn!(error = ?e, "external provider failed, using fallback response"),
            }
        }
        self.fallback.generate_response(message, ctx).await
    }

    async fn evaluate_answer(
        &self,
        student_answer: &str,
        correct_answer: &str,
        ctx: &TutorContext,
    ) -> Result<Evaluation> {
        if let Some(external) = &self.external {
            match external
                .evaluate_answer(student_answer, correct_answer, ctx)
                .await
            {
                Ok(eval) => return Ok(eval),
                Err(e) => warn!(error = ?e, "external provider failed, using fallback evaluation"),
            }
        }
        self.fallback
            .evaluate_answer(student_answer, correct_answer, ctx)
            .await
    }

    async fn generate_exercise(
        &self,
        module: &LearningModule,
        difficulty: &str,
        exercise_type: &str,
    ) -> Result<Exercise> {
        if let Some(external) = &self.external {
            match external
                .generate_exercise(module, difficulty, exercise_type)
                .await
            {
                Ok(exercise) => return Ok(exercise),
                Err(e) => warn!(error = ?e, "external provider failed, using fallback exercise"),
            }
        }
        self.fallback
            .generate_exercise(module, difficulty, exercise_type)
            .await
    }
}
