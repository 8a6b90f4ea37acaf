//! Role-play scenario definitions, as read from the module catalog.
//!
//! A scenario constrains a conversation to a concrete situation with a
//! vocabulary and grammar whitelist and a staged conversation flow. The
//! engine never edits these; they are catalog data.

use serde::{Deserialize, Serialize};

/// A single whitelisted vocabulary entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub category: String,
}

/// A whitelisted grammar structure with usage examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarRule {
    pub structure: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// One stage of the scripted conversation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationStage {
    pub stage: String,
    #[serde(default)]
    pub ai_prompts: Vec<String>,
    #[serde(default)]
    pub expected_responses: Vec<String>,
}

/// A complete constrained role-play definition attached to a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePlayScenario {
    pub situation: String,
    pub setting: String,
    pub student_role: String,
    pub ai_role: String,
    pub objective: String,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyItem>,
    #[serde(default)]
    pub grammar: Vec<GrammarRule>,
    #[serde(default)]
    pub conversation_flow: Vec<ConversationStage>,
}

impl RolePlayScenario {
    /// The framing text shown before the student triggers the role-play.
    ///
    /// Re-emitted verbatim on every message until the start trigger fires,
    /// so it must be self-contained: situation, roles, objective, and how
    /// to begin.
    pub fn framing_text(&self) -> String {
        format!(
            "Role-play: {situation}\nSetting: {setting}\nYou are: {student}\nI am: {ai}\nObjective: {objective}\n\nSay \"let's start\" when you are ready to begin.",
            situation = self.situation,
            setting = self.setting,
            student = self.student_role,
            ai = self.ai_role,
            objective = self.objective,
        )
    }

    /// The opening line once the role-play goes active: the first scripted
    /// prompt if the flow defines one, otherwise a generic opener.
    pub fn opening_line(&self) -> String {
        self.conversation_flow
            .first()
            .and_then(|stage| stage.ai_prompts.first())
            .cloned()
            .unwrap_or_else(|| format!("Great, let's begin! {}", self.situation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> RolePlayScenario {
        RolePlayScenario {
            situation: "Ordering food at a restaurant".into(),
            setting: "A small restaurant in Berlin".into(),
            student_role: "customer".into(),
            ai_role: "waiter".into(),
            objective: "Order a meal and pay".into(),
            vocabulary: vec![],
            grammar: vec![],
            conversation_flow: vec![ConversationStage {
                stage: "greeting".into(),
                ai_prompts: vec!["Guten Abend! Ein Tisch für eine Person?".into()],
                expected_responses: vec![],
            }],
        }
    }

    #[test]
    fn framing_text_names_situation_and_roles() {
        let text = scenario().framing_text();
        assert!(text.contains("Ordering food at a restaurant"));
        assert!(text.contains("customer"));
        assert!(text.contains("waiter"));
        assert!(text.contains("let's start"));
    }

    #[test]
    fn opening_line_uses_first_scripted_prompt() {
        assert_eq!(
            scenario().opening_line(),
            "Guten Abend! Ein Tisch für eine Person?"
        );
    }

    #[test]
    fn opening_line_falls_back_without_flow() {
        let mut s = scenario();
        s.conversation_flow.clear();
        assert!(s.opening_line().contains("Ordering food at a restaurant"));
    }
}
