//! Module Catalog Access
//!
//! The module catalog is an external collaborator: this engine only reads
//! module definitions (tutor configuration plus an optional role-play
//! scenario). The `ModuleCatalog` trait is the seam; `InMemoryCatalog` is a
//! deterministic implementation for development and testing.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::scenario::{ConversationStage, GrammarRule, RolePlayScenario, VocabularyItem};

/// Tutor persona settings attached to a module.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TutorConfig {
    /// Free-text persona description, e.g. "patient and encouraging".
    pub personality: String,
    /// Topics the tutor should steer toward.
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// Phrases the tutor may offer when the student is stuck.
    #[serde(default)]
    pub helpful_phrases: Vec<String>,
}

/// A learning module as published by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningModule {
    pub id: String,
    pub name: String,
    /// Target language of the module, e.g. "German".
    pub language: String,
    /// CEFR tier (A1..C2).
    pub level: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    /// Catalog identity of the teacher who authored the module.
    pub created_by: String,
    #[serde(default)]
    pub tutor: TutorConfig,
    /// Present only for role-play modules; absence means free-form mode.
    #[serde(default)]
    pub scenario: Option<RolePlayScenario>,
}

/// Read-only lookup of module definitions.
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// Fetches a module by id. `Ok(None)` means the catalog has no such module.
    async fn get_module(&self, module_id: &str) -> Result<Option<LearningModule>>;
}

/// A catalog backed by a fixed in-memory map.
pub struct InMemoryCatalog {
    modules: HashMap<String, LearningModule>,
}

impl InMemoryCatalog {
    pub fn new(modules: Vec<LearningModule>) -> Self {
        let modules = modules.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self { modules }
    }

    /// A catalog pre-loaded with two demo modules: a free-form greetings
    /// module and a restaurant role-play module.
    pub fn with_demo_modules() -> Self {
        Self::new(vec![demo_greetings_module(), demo_restaurant_module()])
    }
}

#[async_trait]
impl ModuleCatalog for InMemoryCatalog {
    async fn get_module(&self, module_id: &str) -> Result<Option<LearningModule>> {
        Ok(self.modules.get(module_id).cloned())
    }
}

/// Free-form A1 German greetings module, no scenario.
pub fn demo_greetings_module() -> LearningModule {
    LearningModule {
        id: "basic-greetings".into(),
        name: "Basic Greetings".into(),
        language: "German".into(),
        level: "A1".into(),
        description: "Everyday greetings and introductions.".into(),
        is_active: true,
        created_by: "teacher-demo".into(),
        tutor: TutorConfig {
            personality: "patient and encouraging".into(),
            focus_areas: vec!["greetings".into(), "introductions".into()],
            helpful_phrases: vec!["Guten Tag".into(), "Wie geht es Ihnen?".into()],
        },
        scenario: None,
    }
}

/// A2 German restaurant role-play module with a vocabulary whitelist and a
/// three-stage conversation flow.
pub fn demo_restaurant_module() -> LearningModule {
    LearningModule {
        id: "restaurant-ordering".into(),
        name: "At the Restaurant".into(),
        language: "German".into(),
        level: "A2".into(),
        description: "Order a meal in a German restaurant.".into(),
        is_active: true,
        created_by: "teacher-demo".into(),
        tutor: TutorConfig {
            personality: "friendly and professional".into(),
            focus_areas: vec!["food vocabulary".into(), "polite requests".into()],
            helpful_phrases: vec!["Ich hätte gern...".into(), "Die Rechnung, bitte".into()],
        },
        scenario: Some(RolePlayScenario {
            situation: "Ordering food at a restaurant".into(),
            setting: "A small restaurant in Berlin".into(),
            student_role: "customer".into(),
            ai_role: "waiter".into(),
            objective: "Order a drink and a main course, then ask for the bill".into(),
            vocabulary: vec![
                VocabularyItem {
                    word: "Speisekarte".into(),
                    translation: "menu".into(),
                    category: "restaurant".into(),
                },
                VocabularyItem {
                    word: "bestellen".into(),
                    translation: "to order".into(),
                    category: "verbs".into(),
                },
                VocabularyItem {
                    word: "Rechnung".into(),
                    translation: "bill".into(),
                    category: "restaurant".into(),
                },
                VocabularyItem {
                    word: "Wasser".into(),
                    translation: "water".into(),
                    category: "drinks".into(),
                },
            ],
            grammar: vec![GrammarRule {
                structure: "Ich hätte gern + Akkusativ".into(),
                examples: vec!["Ich hätte gern ein Wasser.".into()],
            }],
            conversation_flow: vec![
                ConversationStage {
                    stage: "greeting".into(),
                    ai_prompts: vec!["Guten Abend! Ein Tisch für eine Person?".into()],
                    expected_responses: vec!["Ja, bitte.".into()],
                },
                ConversationStage {
                    stage: "ordering".into(),
                    ai_prompts: vec!["Was möchten Sie bestellen?".into()],
                    expected_responses: vec!["Ich hätte gern...".into()],
                },
                ConversationStage {
                    stage: "paying".into(),
                    ai_prompts: vec!["Möchten Sie die Rechnung?".into()],
                    expected_responses: vec!["Die Rechnung, bitte.".into()],
                },
            ],
        }),
    }
}
