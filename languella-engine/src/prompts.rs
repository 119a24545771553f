//! Chat-tutor, translation and explanation prompt builders.
//!
//! These produce [`GenerationRequest`]s for the free-text features; their
//! responses are shown to the user as-is, so unlike the exercise builders
//! there is no schema to validate.

use crate::generation::{ChatMessage, GENERATION_MODEL, GenerationRequest};
use crate::{Difficulty, EngineError};

pub const MAX_CHAT_MESSAGE_LEN: usize = 2000;
pub const MAX_TRANSLATE_LEN: usize = 1000;
pub const MAX_EXPLAIN_LEN: usize = 500;
/// How many recent messages of history accompany a tutor turn.
pub const TUTOR_HISTORY_LIMIT: usize = 10;

/// Build the tutor turn: system prompt, trimmed history (oldest first),
/// then the user's latest message.
pub fn tutor_request(
    language: &str,
    difficulty: Difficulty,
    history: &[ChatMessage],
    latest: &str,
) -> Result<GenerationRequest, EngineError> {
    let latest = checked("content", latest, MAX_CHAT_MESSAGE_LEN)?;

    let system = format!(
        r#"You are a language learning AI tutor. The user is studying {language} at a {difficulty} level.

Instructions:
1. Always respond primarily in {language} unless the user asks for help in English
2. Gently correct any grammar mistakes in the user's messages
3. Provide helpful explanations when needed
4. Keep responses appropriate for {difficulty} level learners
5. Be encouraging and supportive
6. If the user makes mistakes, offer gentle corrections and explanations
7. Include cultural context when relevant

Respond as a helpful language tutor would, in {language}."#,
    );

    let recent = history.len().saturating_sub(TUTOR_HISTORY_LIMIT);
    let mut messages = Vec::with_capacity(history.len() - recent + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history[recent..].iter().cloned());
    messages.push(ChatMessage::user(latest));

    Ok(GenerationRequest {
        model: GENERATION_MODEL.to_string(),
        messages,
        max_tokens: 500,
        temperature: 0.7,
    })
}

/// Translate `text` into `target_language`, translation only.
pub fn translate_request(text: &str, target_language: &str) -> Result<GenerationRequest, EngineError> {
    let text = checked("text", text, MAX_TRANSLATE_LEN)?;
    let prompt = format!(
        r#"Translate this text to {target_language}: "{text}". Only provide the translation, no explanations."#
    );
    Ok(GenerationRequest {
        model: GENERATION_MODEL.to_string(),
        messages: vec![ChatMessage::user(prompt)],
        max_tokens: 200,
        temperature: 0.3,
    })
}

/// Ask for a grammar breakdown of `text` in the user's study language.
pub fn explain_request(text: &str, study_language: &str) -> Result<GenerationRequest, EngineError> {
    let text = checked("text", text, MAX_EXPLAIN_LEN)?;
    let prompt = format!(
        r#"Explain the grammar and meaning of this {study_language} text: "{text}". Provide:
1. Literal translation
2. Grammar breakdown (identify parts of speech, tenses, etc.)
3. Cultural context if relevant
4. Alternative ways to say the same thing

Keep explanation clear and helpful for a language learner."#
    );
    Ok(GenerationRequest {
        model: GENERATION_MODEL.to_string(),
        messages: vec![ChatMessage::user(prompt)],
        max_tokens: 400,
        temperature: 0.5,
    })
}

fn checked<'a>(field: &str, value: &'a str, max: usize) -> Result<&'a str, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(EngineError::invalid(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Role;

    #[test]
    fn tutor_request_keeps_only_recent_history() {
        let history: Vec<ChatMessage> = (0..15)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("mensaje {i}"))
                } else {
                    ChatMessage::assistant(format!("respuesta {i}"))
                }
            })
            .collect();

        let request =
            tutor_request("spanish", Difficulty::Beginner, &history, "¿Cómo estás?").unwrap();
        // system + 10 history + latest
        assert_eq!(request.messages.len(), 12);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("spanish"));
        assert!(request.messages[0].content.contains("beginner"));
        // Index 5 of the fixture is an assistant turn.
        assert_eq!(request.messages[1].role, Role::Assistant);
        assert_eq!(request.messages[1].content, "respuesta 5");
        assert_eq!(request.messages.last().unwrap().content, "¿Cómo estás?");
        assert_eq!(request.max_tokens, 500);
    }

    #[test]
    fn translate_and_explain_use_their_own_budgets() {
        let translate = translate_request("hola", "English").unwrap();
        assert_eq!(translate.max_tokens, 200);
        assert!(translate.messages[0].content.contains("English"));

        let explain = explain_request("se me olvidó", "spanish").unwrap();
        assert_eq!(explain.max_tokens, 400);
        assert!(explain.messages[0].content.contains("se me olvidó"));
    }

    #[test]
    fn blank_and_oversized_inputs_are_rejected() {
        assert!(translate_request("   ", "English").is_err());
        assert!(explain_request(&"x".repeat(MAX_EXPLAIN_LEN + 1), "spanish").is_err());
        assert!(tutor_request("spanish", Difficulty::Beginner, &[], "").is_err());
    }
}
