//! Deterministic local fallback provider.
//!
//! Used whenever no external provider is configured or the external call
//! fails. Responses are canned templates keyed by session type; selection
//! among them goes through the injectable `Choice` trait so tests can pin
//! the pick.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;

use crate::catalog::LearningModule;
use crate::types::{MessageType, SessionType};

use super::{Evaluation, Exercise, LanguageProvider, NormalizedResponse, TutorContext};

/// Picks an index in `0..len`. Injectable so canned-response selection is
/// deterministic under test.
pub trait Choice: Send + Sync {
    fn pick(&self, len: usize) -> usize;
}

/// Uniform random selection, the production default.
pub struct RandomChoice;

impl Choice for RandomChoice {
    fn pick(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        rand::rng().random_range(0..len)
    }
}

/// Always picks the same index (clamped), for tests.
pub struct FixedChoice(pub usize);

impl Choice for FixedChoice {
    fn pick(&self, len: usize) -> usize {
        if len == 0 { 0 } else { self.0.min(len - 1) }
    }
}

const PRACTICE_RESPONSES: [&str; 4] = [
    "Good effort! Let's keep practicing. Try forming another sentence with the words you know.",
    "Nice work! Repetition is how this sticks. Can you say that a slightly different way?",
    "Well done! Let's try one more. How would you respond if someone greeted you?",
    "You're making progress! Try using one of the helpful phrases from this module.",
];

const ASSESSMENT_RESPONSES: [&str; 3] = [
    "Thank you for your answer. Let's move on to the next question.",
    "Noted. Here is another question to check your understanding.",
    "Answer recorded. Ready for the next one?",
];

const HELP_RESPONSES: [&str; 3] = [
    "Let me explain that differently. Break the sentence into small parts and translate each one.",
    "A good trick: start from the verb and build the sentence around it.",
    "Don't worry, this is a common sticking point. Re-read the example phrases and try again.",
];

const CONVERSATION_RESPONSES: [&str; 3] = [
    "That's interesting! Tell me more about that.",
    "I see. And what happened next?",
    "Good point. How would you describe that in your own words?",
];

const REVIEW_RESPONSES: [&str; 2] = [
    "Let's review what you've learned so far. Can you recall the key phrases from this module?",
    "Quick review: try translating one of the module's helpful phrases from memory.",
];

const SUGGESTIONS: [&str; 3] = [
    "Can you give me an example?",
    "How do I say this politely?",
    "Let's try another exercise.",
];

/// Offline templated provider. Side-effect free and infallible.
pub struct FallbackProvider {
    choice: Arc<dyn Choice>,
}

impl FallbackProvider {
    pub fn new(choice: Arc<dyn Choice>) -> Self {
        Self { choice }
    }

    /// Fallback with uniform random canned-response selection.
    pub fn random() -> Self {
        Self::new(Arc::new(RandomChoice))
    }

    fn canned(&self, session_type: SessionType) -> &'static str {
        let pool: &[&'static str] = match session_type {
            SessionType::Practice => &PRACTICE_RESPONSES,
            SessionType::Assessment | SessionType::TeacherTest => &ASSESSMENT_RESPONSES,
            SessionType::Help => &HELP_RESPONSES,
            SessionType::Conversation => &CONVERSATION_RESPONSES,
            SessionType::Review => &REVIEW_RESPONSES,
        };
        pool[self.choice.pick(pool.len())]
    }
}

#[async_trait]
impl LanguageProvider for FallbackProvider {
    async fn generate_response(
        &self,
        _message: &str,
        ctx: &TutorContext,
    ) -> Result<NormalizedResponse> {
        Ok(NormalizedResponse {
            content: self.canned(ctx.session_type).to_string(),
            message_type: MessageType::Text,
            suggestions: SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            session_state: None,
        })
    }

    async fn evaluate_answer(
        &self,
        student_answer: &str,
        correct_answer: &str,
        _ctx: &TutorContext,
    ) -> Result<Evaluation> {
        // Trimmed, case-insensitive comparison.
        let is_correct =
            student_answer.trim().to_lowercase() == correct_answer.trim().to_lowercase();
        let feedback = if is_correct {
            "Correct! Well done.".to_string()
        } else {
            format!("Not quite. The expected answer was \"{}\".", correct_answer.trim())
        };
        Ok(Evaluation {
            is_correct,
            feedback,
            correct_answer: Some(correct_answer.trim().to_string()),
        })
    }

    async fn generate_exercise(
        &self,
        module: &LearningModule,
        difficulty: &str,
        exercise_type: &str,
    ) -> Result<Exercise> {
        // Deterministic: first helpful phrase of the module becomes the prompt.
        let phrase = module
            .tutor
            .helpful_phrases
            .first()
            .cloned()
            .unwrap_or_else(|| "Hello".to_string());
        Ok(Exercise {
            prompt: format!(
                "Translate the following {} phrase into English: \"{}\"",
                module.language, phrase
            ),
            exercise_type: exercise_type.to_string(),
            expected_answer: phrase,
            choices: Vec::new(),
            hint: Some(format!("This is a {} level ({}) exercise.", module.level, difficulty)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roleplay::RolePlayPhase;

    fn ctx(session_type: SessionType) -> TutorContext {
        TutorContext {
            session_type,
            phase: Some(RolePlayPhase::Active),
            system_prompt: String::new(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn practice_pool_has_four_responses() {
        for i in 0..4 {
            let provider = FallbackProvider::new(Arc::new(FixedChoice(i)));
            let response = provider
                .generate_response("hello", &ctx(SessionType::Practice))
                .await
                .unwrap();
            assert_eq!(response.content, PRACTICE_RESPONSES[i]);
            assert!(!response.suggestions.is_empty());
        }
    }

    #[tokio::test]
    async fn fixed_choice_is_deterministic() {
        let provider = FallbackProvider::new(Arc::new(FixedChoice(2)));
        let a = provider
            .generate_response("x", &ctx(SessionType::Conversation))
            .await
            .unwrap();
        let b = provider
            .generate_response("y", &ctx(SessionType::Conversation))
            .await
            .unwrap();
        assert_eq!(a.content, b.content);
    }

    #[tokio::test]
    async fn evaluate_is_trimmed_and_case_insensitive() {
        let provider = FallbackProvider::new(Arc::new(FixedChoice(0)));
        let eval = provider
            .evaluate_answer("Guten Tag", " guten tag ", &ctx(SessionType::Practice))
            .await
            .unwrap();
        assert!(eval.is_correct);

        let eval = provider
            .evaluate_answer("Guten Abend", "Guten Tag", &ctx(SessionType::Practice))
            .await
            .unwrap();
        assert!(!eval.is_correct);
        assert!(eval.feedback.contains("Guten Tag"));
    }

    #[tokio::test]
    async fn exercise_uses_module_phrase() {
        let provider = FallbackProvider::new(Arc::new(FixedChoice(0)));
        let module = crate::catalog::demo_greetings_module();
        let exercise = provider
            .generate_exercise(&module, "easy", "translation")
            .await
            .unwrap();
        assert!(exercise.prompt.contains("Guten Tag"));
        assert_eq!(exercise.expected_answer, "Guten Tag");
    }

    #[test]
    fn random_choice_stays_in_bounds() {
        let choice = RandomChoice;
        for _ in 0..100 {
            assert!(choice.pick(4) < 4);
        }
        assert_eq!(choice.pick(1), 0);
        assert_eq!(choice.pick(0), 0);
    }
}
