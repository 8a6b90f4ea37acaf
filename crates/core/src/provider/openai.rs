//! External provider implementation over an OpenAI-compatible chat API.
//!
//! Errors here propagate to the `ProviderRouter`, which substitutes fallback
//! output; nothing in this module is user-visible failure.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

use crate::catalog::LearningModule;
use crate::types::TurnRole;

use super::{Evaluation, Exercise, LanguageProvider, NormalizedResponse, TutorContext, normalize};

/// A provider backed by any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    /// Creates a provider from an API configuration and model identifier
    /// (e.g. "gpt-4o-mini").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    async fn complete(&self, messages: Vec<ChatCompletionRequestMessage>) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .context("No response choice from provider")?
            .message
            .content
            .as_ref()
            .context("No content in provider response")?;
        Ok(content.clone())
    }

    fn history_messages(ctx: &TutorContext) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(ctx.system_prompt.clone())
                .build()?
                .into(),
        ];
        for turn in &ctx.history {
            match turn.role {
                TurnRole::Student => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content.clone())
                        .build()?
                        .into(),
                ),
                TurnRole::Tutor => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.clone())
                        .build()?
                        .into(),
                ),
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl LanguageProvider for OpenAiProvider {
    async fn generate_response(
        &self,
        message: &str,
        ctx: &TutorContext,
    ) -> Result<NormalizedResponse> {
        let mut messages = Self::history_messages(ctx)?;
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.to_string())
                .build()?
                .into(),
        );

        let raw = self.complete(messages).await?;
        Ok(normalize::parse(&raw))
    }

    async fn evaluate_answer(
        &self,
        student_answer: &str,
        correct_answer: &str,
        ctx: &TutorContext,
    ) -> Result<Evaluation> {
        let prompt = format!(
            "Evaluate the student's answer to a language exercise.\n\
             Expected answer: \"{correct_answer}\"\n\
             Student answer: \"{student_answer}\"\n\
             Accept minor spelling and punctuation differences.\n\
             Respond with JSON only: {{\"is_correct\": bool, \"feedback\": \"short feedback\"}}"
        );
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(ctx.system_prompt.clone())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        ];

        let raw = self.complete(messages).await?;
        // The evaluation shape is stricter than a chat response: a provider
        // that answered in prose is an error, handled by the router.
        let body = normalize::strip_code_fences(raw.trim());
        let eval: Evaluation = serde_json::from_str(body.trim())
            .context("Provider evaluation was not valid JSON")?;
        Ok(eval)
    }

    async fn generate_exercise(
        &self,
        module: &LearningModule,
        difficulty: &str,
        exercise_type: &str,
    ) -> Result<Exercise> {
        let prompt = format!(
            "Generate one {exercise_type} exercise for a {level} {language} learner \
             studying \"{name}\" at {difficulty} difficulty.\n\
             Respond with JSON only: {{\"prompt\": \"...\", \"exercise_type\": \"{exercise_type}\", \
             \"expected_answer\": \"...\", \"choices\": [], \"hint\": \"...\"}}",
            level = module.level,
            language = module.language,
            name = module.name,
        );
        let messages = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        ];

        let raw = self.complete(messages).await?;
        let body = normalize::strip_code_fences(raw.trim());
        let exercise: Exercise = serde_json::from_str(body.trim())
            .context("Provider exercise was not valid JSON")?;
        Ok(exercise)
    }
}
