//! Building generation requests for practice sentences and quizzes, and
//! validating what the provider sends back.
//!
//! The provider's output is untrusted text. It is expected to contain a
//! JSON payload somewhere inside it (models like wrapping JSON in prose or
//! code fences), and that payload is fully validated against the expected
//! schema before anything reaches a caller. Validation failures surface as
//! `MalformedGenerationResponse`; nothing partially parsed escapes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Difficulty, EngineError, VocabularyEntry};

/// Model hint sent to the text-generation provider.
pub const GENERATION_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const MAX_PRACTICE_WORDS: usize = 10;
pub const PRACTICE_SENTENCE_COUNT: usize = 5;
pub const MAX_QUIZ_QUESTIONS: usize = 20;
pub const DEFAULT_QUIZ_QUESTIONS: usize = 10;
pub const QUIZ_OPTION_COUNT: usize = 4;

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    parse_display::Display,
    parse_display::FromStr,
)]
#[serde(rename_all = "lowercase")]
#[display(style = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A well-formed request for the external text-generation provider:
/// model hint, message list, token budget and temperature. Serializes
/// directly as an OpenRouter/OpenAI chat-completions body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The word/translation pair a prompt needs; a projection of
/// [`VocabularyEntry`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptWord {
    pub word: String,
    pub translation: String,
}

impl From<&VocabularyEntry> for PromptWord {
    fn from(entry: &VocabularyEntry) -> Self {
        PromptWord {
            word: entry.word.clone(),
            translation: entry.translation.clone(),
        }
    }
}

/// One fill-in-the-blank exercise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Exercise {
    pub sentence_with_blank: String,
    pub complete_sentence: String,
    pub translation: String,
    pub missing_word: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PracticeSheet {
    pub exercises: Vec<Exercise>,
}

/// One multiple-choice question: four options, `correct_answer` indexes
/// the right one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u8,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuizSheet {
    pub questions: Vec<QuizQuestion>,
}

/// Build the generation request for fill-in-the-blank practice sentences.
/// Takes between 1 and [`MAX_PRACTICE_WORDS`] words.
pub fn build_practice_request(
    words: &[PromptWord],
    language: &str,
    difficulty: Difficulty,
) -> Result<GenerationRequest, EngineError> {
    if words.is_empty() {
        return Err(EngineError::invalid(
            "at least one vocabulary word is required",
        ));
    }
    if words.len() > MAX_PRACTICE_WORDS {
        return Err(EngineError::invalid(format!(
            "at most {MAX_PRACTICE_WORDS} vocabulary words per practice request"
        )));
    }

    let word_list = words
        .iter()
        .map(|w| w.word.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let prompt = format!(
        r#"Create {PRACTICE_SENTENCE_COUNT} practice sentences in {language} at {difficulty} level using these vocabulary words: {word_list}.

For each sentence:
1. Create a fill-in-the-blank version (replace one of the vocabulary words with _____)
2. Provide the complete sentence
3. Provide English translation

Respond with a single JSON object matching this schema, and nothing else:
{schema}"#,
        schema = schema_text::<PracticeSheet>(),
    );

    Ok(GenerationRequest {
        model: GENERATION_MODEL.to_string(),
        messages: vec![ChatMessage::user(prompt)],
        max_tokens: 800,
        temperature: 0.7,
    })
}

/// Build the generation request for a multiple-choice quiz over `words`.
/// `words` must be non-empty and `count` between 1 and
/// [`MAX_QUIZ_QUESTIONS`].
pub fn build_quiz_request(
    words: &[PromptWord],
    language: &str,
    difficulty: Difficulty,
    count: usize,
) -> Result<GenerationRequest, EngineError> {
    if words.is_empty() {
        return Err(EngineError::invalid(
            "at least one vocabulary word is required",
        ));
    }
    if count == 0 || count > MAX_QUIZ_QUESTIONS {
        return Err(EngineError::invalid(format!(
            "count must be between 1 and {MAX_QUIZ_QUESTIONS}"
        )));
    }

    let vocabulary_list = words
        .iter()
        .map(|w| format!("{} ({})", w.word, w.translation))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        r#"Create {count} multiple choice quiz questions in {language} at {difficulty} level using these vocabulary words:

{vocabulary_list}

For each question, create:
1. A question in {language} (translation, definition, or usage)
2. {QUIZ_OPTION_COUNT} multiple choice answers (one correct, three distractors)
3. The correct answer index (0-3)

Respond with a single JSON object matching this schema, and nothing else:
{schema}"#,
        schema = schema_text::<QuizSheet>(),
    );

    Ok(GenerationRequest {
        model: GENERATION_MODEL.to_string(),
        messages: vec![ChatMessage::user(prompt)],
        max_tokens: 1200,
        temperature: 0.7,
    })
}

/// Pick quiz material: the least-practiced words first, at most `count`.
pub fn select_quiz_words(entries: &[VocabularyEntry], count: usize) -> Vec<PromptWord> {
    let mut by_practice: Vec<&VocabularyEntry> = entries.iter().collect();
    by_practice.sort_by_key(|entry| entry.times_practiced);
    by_practice.into_iter().take(count).map(PromptWord::from).collect()
}

/// Parse and validate a practice-sentence response.
pub fn parse_practice_sheet(text: &str) -> Result<PracticeSheet, EngineError> {
    let sheet: PracticeSheet = parse_payload(text)?;
    if sheet.exercises.is_empty() {
        return Err(malformed("response contains no exercises"));
    }
    for (i, exercise) in sheet.exercises.iter().enumerate() {
        for (field, value) in [
            ("sentence_with_blank", &exercise.sentence_with_blank),
            ("complete_sentence", &exercise.complete_sentence),
            ("translation", &exercise.translation),
            ("missing_word", &exercise.missing_word),
        ] {
            if value.trim().is_empty() {
                return Err(malformed(format!("exercise {i} has a blank {field}")));
            }
        }
    }
    Ok(sheet)
}

/// Parse and validate a quiz response.
pub fn parse_quiz_sheet(text: &str) -> Result<QuizSheet, EngineError> {
    let sheet: QuizSheet = parse_payload(text)?;
    if sheet.questions.is_empty() {
        return Err(malformed("response contains no questions"));
    }
    for (i, question) in sheet.questions.iter().enumerate() {
        if question.question.trim().is_empty() {
            return Err(malformed(format!("question {i} is blank")));
        }
        if question.options.len() != QUIZ_OPTION_COUNT {
            return Err(malformed(format!(
                "question {i} has {} options, expected {QUIZ_OPTION_COUNT}",
                question.options.len()
            )));
        }
        if question.options.iter().any(|option| option.trim().is_empty()) {
            return Err(malformed(format!("question {i} has a blank option")));
        }
        if usize::from(question.correct_answer) >= QUIZ_OPTION_COUNT {
            return Err(malformed(format!(
                "question {i} has correct_answer {}, expected 0-{}",
                question.correct_answer,
                QUIZ_OPTION_COUNT - 1
            )));
        }
    }
    Ok(sheet)
}

fn parse_payload<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, EngineError> {
    let payload = extract_json_object(text)?;
    serde_json::from_str(payload).map_err(|e| malformed(e.to_string()))
}

/// Slice out the JSON object embedded in the provider's text, tolerating
/// code fences and surrounding prose.
fn extract_json_object(text: &str) -> Result<&str, EngineError> {
    let start = text
        .find('{')
        .ok_or_else(|| malformed("no JSON object in response"))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| malformed("no JSON object in response"))?;
    if end < start {
        return Err(malformed("no JSON object in response"));
    }
    Ok(&text[start..=end])
}

fn malformed(message: impl Into<String>) -> EngineError {
    EngineError::MalformedGenerationResponse(message.into())
}

fn schema_text<T: JsonSchema>() -> String {
    serde_json::to_string_pretty(&schemars::schema_for!(T)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewEntry;
    use chrono::Utc;
    use uuid::Uuid;

    fn words(n: usize) -> Vec<PromptWord> {
        (0..n)
            .map(|i| PromptWord {
                word: format!("palabra{i}"),
                translation: format!("word{i}"),
            })
            .collect()
    }

    #[test]
    fn practice_request_embeds_words_language_and_budget() {
        let request = build_practice_request(&words(3), "spanish", Difficulty::Intermediate).unwrap();
        assert_eq!(request.model, GENERATION_MODEL);
        assert_eq!(request.max_tokens, 800);
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("spanish"));
        assert!(prompt.contains("intermediate"));
        assert!(prompt.contains("palabra2"));
        assert!(prompt.contains("sentence_with_blank"));
    }

    #[test]
    fn practice_request_rejects_empty_and_oversized_word_sets() {
        assert!(matches!(
            build_practice_request(&[], "spanish", Difficulty::Beginner),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_practice_request(&words(MAX_PRACTICE_WORDS + 1), "spanish", Difficulty::Beginner),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(build_practice_request(&words(MAX_PRACTICE_WORDS), "spanish", Difficulty::Beginner).is_ok());
    }

    #[test]
    fn quiz_request_rejects_empty_words_and_bad_counts() {
        assert!(matches!(
            build_quiz_request(&[], "spanish", Difficulty::Beginner, DEFAULT_QUIZ_QUESTIONS),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_quiz_request(&words(5), "spanish", Difficulty::Beginner, 0),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_quiz_request(&words(5), "spanish", Difficulty::Beginner, MAX_QUIZ_QUESTIONS + 1),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(build_quiz_request(&words(5), "spanish", Difficulty::Advanced, 10).is_ok());
    }

    #[test]
    fn quiz_words_prefer_the_least_practiced() {
        let owner = Uuid::new_v4();
        let entries: Vec<_> = (0..4u32)
            .map(|i| {
                let mut entry = NewEntry {
                    word: format!("palabra{i}"),
                    translation: format!("word{i}"),
                    language: "spanish".into(),
                    ..Default::default()
                }
                .into_entry(owner, Utc::now())
                .unwrap();
                entry.times_practiced = 10 - i;
                entry
            })
            .collect();

        let picked = select_quiz_words(&entries, 2);
        assert_eq!(picked[0].word, "palabra3");
        assert_eq!(picked[1].word, "palabra2");
    }

    #[test]
    fn practice_sheet_parses_from_fenced_output() {
        let text = r#"Here you go!
```json
{"exercises": [{"sentence_with_blank": "El _____ duerme.", "complete_sentence": "El gato duerme.", "translation": "The cat sleeps.", "missing_word": "gato"}]}
```"#;
        let sheet = parse_practice_sheet(text).unwrap();
        assert_eq!(sheet.exercises.len(), 1);
        assert_eq!(sheet.exercises[0].missing_word, "gato");
    }

    #[test]
    fn practice_sheet_rejects_missing_fields_and_junk() {
        assert!(matches!(
            parse_practice_sheet("no json here at all"),
            Err(EngineError::MalformedGenerationResponse(_))
        ));
        // missing_word absent
        let text = r#"{"exercises": [{"sentence_with_blank": "a", "complete_sentence": "b", "translation": "c"}]}"#;
        assert!(matches!(
            parse_practice_sheet(text),
            Err(EngineError::MalformedGenerationResponse(_))
        ));
        // blank field
        let text = r#"{"exercises": [{"sentence_with_blank": "a", "complete_sentence": "b", "translation": "c", "missing_word": "  "}]}"#;
        assert!(matches!(
            parse_practice_sheet(text),
            Err(EngineError::MalformedGenerationResponse(_))
        ));
        assert!(matches!(
            parse_practice_sheet(r#"{"exercises": []}"#),
            Err(EngineError::MalformedGenerationResponse(_))
        ));
    }

    #[test]
    fn quiz_sheet_validates_every_question_invariant() {
        let good = r#"{"questions": [{"question": "¿gato?", "options": ["cat", "dog", "bird", "fish"], "correct_answer": 0, "explanation": "gato means cat"}]}"#;
        let sheet = parse_quiz_sheet(good).unwrap();
        assert_eq!(sheet.questions[0].correct_answer, 0);

        // Missing correct_answer
        let missing = r#"{"questions": [{"question": "¿gato?", "options": ["a", "b", "c", "d"]}]}"#;
        assert!(matches!(
            parse_quiz_sheet(missing),
            Err(EngineError::MalformedGenerationResponse(_))
        ));

        // Wrong option count
        let three = r#"{"questions": [{"question": "¿gato?", "options": ["a", "b", "c"], "correct_answer": 0}]}"#;
        assert!(matches!(
            parse_quiz_sheet(three),
            Err(EngineError::MalformedGenerationResponse(_))
        ));

        // Out-of-range index
        let out_of_range = r#"{"questions": [{"question": "¿gato?", "options": ["a", "b", "c", "d"], "correct_answer": 4}]}"#;
        assert!(matches!(
            parse_quiz_sheet(out_of_range),
            Err(EngineError::MalformedGenerationResponse(_))
        ));

        // Type mismatch
        let mismatched = r#"{"questions": [{"question": "¿gato?", "options": ["a", "b", "c", "d"], "correct_answer": "0"}]}"#;
        assert!(matches!(
            parse_quiz_sheet(mismatched),
            Err(EngineError::MalformedGenerationResponse(_))
        ));
    }
}
