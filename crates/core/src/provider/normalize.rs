//! Provider response normalization.
//!
//! Providers return raw JSON, JSON wrapped in fenced code blocks, or plain
//! prose. The parse chain is ordered and total: (1) direct JSON parse,
//! (2) strip ``` fences and retry, (3) wrap the raw text as a plain text
//! response. It never errors.

use serde::Deserialize;

use crate::roleplay::RolePlayPhase;
use crate::types::MessageType;

use super::NormalizedResponse;

/// Relaxed wire shape accepted from providers. Field-name aliases cover the
/// camelCase the external model tends to emit.
#[derive(Deserialize)]
struct WireResponse {
    #[serde(alias = "response")]
    content: String,
    #[serde(default, alias = "messageType")]
    message_type: Option<MessageType>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default, alias = "sessionState")]
    session_state: Option<RolePlayPhase>,
}

impl From<WireResponse> for NormalizedResponse {
    fn from(wire: WireResponse) -> Self {
        NormalizedResponse {
            content: wire.content,
            message_type: wire.message_type.unwrap_or(MessageType::Text),
            suggestions: wire.suggestions,
            session_state: wire.session_state,
        }
    }
}

/// Normalizes arbitrary provider output into a `NormalizedResponse`.
pub fn parse(raw: &str) -> NormalizedResponse {
    let trimmed = raw.trim();

    if let Ok(wire) = serde_json::from_str::<WireResponse>(trimmed) {
        return wire.into();
    }

    let unfenced = strip_code_fences(trimmed);
    if let Ok(wire) = serde_json::from_str::<WireResponse>(unfenced.trim()) {
        return wire.into();
    }

    NormalizedResponse::text(trimmed)
}

/// Removes a surrounding ``` fence (with or without a language tag) if the
/// text carries one; otherwise returns the input unchanged.
pub fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line if present ("json", "JSON", ...).
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_json() {
        let raw = r#"{"content": "Guten Tag!", "messageType": "conversation", "suggestions": ["Hallo"]}"#;
        let response = parse(raw);
        assert_eq!(response.content, "Guten Tag!");
        assert_eq!(response.message_type, MessageType::Conversation);
        assert_eq!(response.suggestions, vec!["Hallo"]);
        assert!(response.session_state.is_none());
    }

    #[test]
    fn parses_fenced_json_with_language_tag() {
        let raw = "```json\n{\"content\": \"Sehr gut!\", \"sessionState\": \"completed\"}\n```";
        let response = parse(raw);
        assert_eq!(response.content, "Sehr gut!");
        assert_eq!(response.session_state, Some(RolePlayPhase::Completed));
    }

    #[test]
    fn parses_fenced_json_without_language_tag() {
        let raw = "```\n{\"content\": \"ok\"}\n```";
        let response = parse(raw);
        assert_eq!(response.content, "ok");
        assert_eq!(response.message_type, MessageType::Text);
    }

    #[test]
    fn accepts_response_field_alias() {
        let raw = r#"{"response": "Wie geht's?"}"#;
        assert_eq!(parse(raw).content, "Wie geht's?");
    }

    #[test]
    fn wraps_plain_text() {
        let response = parse("  Das ist keine JSON-Antwort.  ");
        assert_eq!(response.content, "Das ist keine JSON-Antwort.");
        assert_eq!(response.message_type, MessageType::Text);
        assert!(response.suggestions.is_empty());
        assert!(response.session_state.is_none());
    }

    #[test]
    fn wraps_malformed_json_as_text() {
        let raw = r#"{"content": "broken"#;
        let response = parse(raw);
        assert_eq!(response.content, raw);
        assert_eq!(response.message_type, MessageType::Text);
    }

    #[test]
    fn never_panics_on_odd_input() {
        for raw in ["", "```", "``````", "```json", "{}", "null", "[1,2,3]"] {
            let _ = parse(raw);
        }
    }
}
