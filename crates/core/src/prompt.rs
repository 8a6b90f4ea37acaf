//! System prompt construction.
//!
//! Free-form modules get a persona prompt built from the module's tutor
//! configuration plus a session-type suffix. Role-play modules get a stricter
//! prompt that enumerates the scenario, the vocabulary/grammar whitelist, the
//! conversation-flow stages, and the state-transition rules.

use crate::catalog::LearningModule;
use crate::scenario::RolePlayScenario;
use crate::types::SessionType;

/// Builds the system prompt for a module and session type. Role-play modules
/// always use the scenario prompt.
pub fn system_prompt(module: &LearningModule, session_type: SessionType) -> String {
    match &module.scenario {
        Some(scenario) => role_play_prompt(module, scenario),
        None => standard_prompt(module, session_type),
    }
}

fn standard_prompt(module: &LearningModule, session_type: SessionType) -> String {
    let mut prompt = format!(
        "You are a {language} tutor for the module \"{name}\" (CEFR {level}).\n\
         Personality: {personality}.\n",
        language = module.language,
        name = module.name,
        level = module.level,
        personality = module.tutor.personality,
    );
    if !module.tutor.focus_areas.is_empty() {
        prompt.push_str(&format!(
            "Focus areas: {}.\n",
            module.tutor.focus_areas.join(", ")
        ));
    }
    if !module.tutor.helpful_phrases.is_empty() {
        prompt.push_str(&format!(
            "Offer these phrases when the student is stuck: {}.\n",
            module.tutor.helpful_phrases.join("; ")
        ));
    }
    prompt.push_str(session_type_suffix(session_type));
    prompt.push_str(
        "\nAlways respond with JSON: {\"content\": \"your reply\", \
         \"messageType\": \"text\", \"suggestions\": [\"up to three short replies the student could give\"]}",
    );
    prompt
}

fn session_type_suffix(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Practice => {
            "This is a practice session: keep exercises short, correct gently, and encourage repetition.\n"
        }
        SessionType::Assessment => {
            "This is an assessment: ask one question at a time and do not reveal answers until the student responds.\n"
        }
        SessionType::Help => {
            "This is a help session: explain concepts step by step in the student's native language.\n"
        }
        SessionType::Conversation => {
            "This is a free conversation: keep the dialogue flowing and gently recast mistakes.\n"
        }
        SessionType::Review => {
            "This is a review session: revisit previously covered material and probe recall.\n"
        }
        SessionType::TeacherTest => {
            "This is a teacher test run: behave exactly as you would for a student.\n"
        }
    }
}

fn role_play_prompt(module: &LearningModule, scenario: &RolePlayScenario) -> String {
    let mut prompt = format!(
        "You are running a constrained {language} role-play (CEFR {level}).\n\
         Situation: {situation}\n\
         Setting: {setting}\n\
         The student plays: {student_role}\n\
         You play: {ai_role}\n\
         Objective: {objective}\n\n",
        language = module.language,
        level = module.level,
        situation = scenario.situation,
        setting = scenario.setting,
        student_role = scenario.student_role,
        ai_role = scenario.ai_role,
        objective = scenario.objective,
    );

    prompt.push_str("Allowed vocabulary (do not introduce words beyond this list):\n");
    for item in &scenario.vocabulary {
        prompt.push_str(&format!("- {} ({})\n", item.word, item.translation));
    }
    prompt.push_str("Allowed grammar structures:\n");
    for rule in &scenario.grammar {
        prompt.push_str(&format!("- {}", rule.structure));
        if !rule.examples.is_empty() {
            prompt.push_str(&format!(" (e.g. {})", rule.examples.join("; ")));
        }
        prompt.push('\n');
    }
    prompt.push_str("Conversation flow stages:\n");
    for stage in &scenario.conversation_flow {
        prompt.push_str(&format!(
            "- {}: prompts {:?}, expected responses {:?}\n",
            stage.stage, stage.ai_prompts, stage.expected_responses
        ));
    }

    prompt.push_str(
        "\nState rules:\n\
         1. The session starts in 'introduction'; stay out of character until the student says a start phrase (e.g. \"let's start\", \"begin\").\n\
         2. While 'active', stay in character and speak only in the target language.\n\
         3. When every objective is met, set \"sessionState\": \"completed\" in your JSON response. Never claim completion in prose alone.\n\
         4. If the student asks to stop (stop/end/finish/quit/exit), the server ends the session; do not resist.\n\
         Outside the 'active' state, respond in the student's native language.\n\
         Always respond with JSON: {\"content\": \"...\", \"messageType\": \"role-play-active\", \
         \"suggestions\": [\"...\"], \"sessionState\": \"active\" or \"completed\"}",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{demo_greetings_module, demo_restaurant_module};

    #[test]
    fn standard_prompt_includes_persona_and_suffix() {
        let module = demo_greetings_module();
        let prompt = system_prompt(&module, SessionType::Practice);
        assert!(prompt.contains("German tutor"));
        assert!(prompt.contains("patient and encouraging"));
        assert!(prompt.contains("practice session"));
        assert!(prompt.contains("Guten Tag"));
    }

    #[test]
    fn suffix_varies_by_session_type() {
        let module = demo_greetings_module();
        let practice = system_prompt(&module, SessionType::Practice);
        let assessment = system_prompt(&module, SessionType::Assessment);
        assert_ne!(practice, assessment);
        assert!(assessment.contains("assessment"));
    }

    #[test]
    fn role_play_prompt_lists_whitelist_and_rules() {
        let module = demo_restaurant_module();
        let prompt = system_prompt(&module, SessionType::Practice);
        assert!(prompt.contains("Ordering food at a restaurant"));
        assert!(prompt.contains("Speisekarte"));
        assert!(prompt.contains("Ich hätte gern + Akkusativ"));
        assert!(prompt.contains("greeting"));
        assert!(prompt.contains("sessionState"));
        assert!(prompt.contains("only in the target language"));
    }
}
