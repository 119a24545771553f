//! Vocabulary mastery engine for Languella.
//!
//! Everything with a business rule lives here: the four-state strength
//! progression, daily review selection, practice recording over a storage
//! abstraction, and the construction/validation of LLM generation requests
//! for practice sentences and quizzes. There is no HTTP and no network in
//! this crate; the backend wires these operations to Supabase and
//! OpenRouter.

pub mod generation;
pub mod practice;
pub mod prompts;
pub mod review;
pub mod store;
pub mod strength;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::store::{EntryFilter, MemoryStore, VocabularyStore};
pub use crate::strength::{Strength, apply_outcome};

pub const MAX_WORD_LEN: usize = 100;
pub const MAX_TRANSLATION_LEN: usize = 200;
pub const MAX_LANGUAGE_LEN: usize = 50;
pub const MAX_CONTEXT_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_PART_OF_SPEECH_LEN: usize = 50;
pub const MAX_SESSION_MINUTES: u32 = 480;

/// Every failure an engine operation can surface.
///
/// `NotFound`, `InvalidArgument` and `MalformedGenerationResponse` are
/// terminal for the calling request. `Conflict` means a concurrent update
/// won the race and the caller may retry. `GenerationUnavailable` covers
/// any non-success from the external text-generation provider; it never
/// leaves vocabulary state partially applied.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("the entry was modified concurrently, retry")]
    Conflict,
    #[error("text generation unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("malformed generation response: {0}")]
    MalformedGenerationResponse(String),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument(message.into())
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    parse_display::Display,
    parse_display::FromStr,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
#[display(style = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    parse_display::Display,
    parse_display::FromStr,
)]
#[serde(rename_all = "lowercase")]
#[display(style = "lowercase")]
pub enum SessionType {
    Chat,
    Flashcards,
    Practice,
}

/// A word in a user's personal vocabulary. Owned exclusively by one user;
/// serialized field names match the Supabase `vocabulary` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub word: String,
    pub translation: String,
    pub language: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub part_of_speech: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub strength: Strength,
    pub times_practiced: u32,
    #[serde(default)]
    pub last_practiced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One answer attempt against a vocabulary entry. Append-only: never
/// mutated, deleted only when its parent entry is hard-deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PracticeEvent {
    pub id: Uuid,
    pub vocabulary_id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub correct: bool,
    #[serde(default)]
    pub time_taken_seconds: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// One completed study activity. Created once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub session_type: SessionType,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub words_practiced: Option<u32>,
    #[serde(default)]
    pub accuracy_score: Option<f64>,
    pub completed_at: DateTime<Utc>,
}

/// Input for creating a vocabulary entry, before normalization.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewEntry {
    pub word: String,
    pub translation: String,
    pub language: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub part_of_speech: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewEntry {
    /// Validate and normalize into a fresh entry. Word, translation and
    /// language are trimmed and case-folded; tags are trimmed with
    /// duplicates collapsed. Strength starts at `new`.
    pub fn into_entry(self, owner: Uuid, now: DateTime<Utc>) -> Result<VocabularyEntry, EngineError> {
        let word = normalized_required("word", &self.word, MAX_WORD_LEN)?;
        let translation = normalized_required("translation", &self.translation, MAX_TRANSLATION_LEN)?;
        let language = normalized_required("language", &self.language, MAX_LANGUAGE_LEN)?;
        let context = normalized_optional("context", self.context, MAX_CONTEXT_LEN)?;
        let notes = normalized_optional("notes", self.notes, MAX_NOTES_LEN)?;
        let part_of_speech =
            normalized_optional("part_of_speech", self.part_of_speech, MAX_PART_OF_SPEECH_LEN)?;

        let tags: BTreeSet<String> = self
            .tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(VocabularyEntry {
            id: Uuid::new_v4(),
            owner,
            word,
            translation,
            language,
            context,
            notes,
            part_of_speech,
            tags,
            strength: Strength::default(),
            times_practiced: 0,
            last_practiced_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A partial edit of a vocabulary entry. Only the owning user's explicit
/// edits go through here; practice outcomes use the recorder instead.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<Strength>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.word.is_none()
            && self.translation.is_none()
            && self.context.is_none()
            && self.notes.is_none()
            && self.part_of_speech.is_none()
            && self.strength.is_none()
            && self.tags.is_none()
    }

    /// Normalize every present field, rejecting out-of-bounds values.
    pub fn validated(mut self) -> Result<Self, EngineError> {
        if self.is_empty() {
            return Err(EngineError::invalid("no valid fields to update"));
        }
        if let Some(word) = self.word.take() {
            self.word = Some(normalized_required("word", &word, MAX_WORD_LEN)?);
        }
        if let Some(translation) = self.translation.take() {
            self.translation = Some(normalized_required(
                "translation",
                &translation,
                MAX_TRANSLATION_LEN,
            )?);
        }
        if let Some(context) = self.context.take() {
            self.context = normalized_optional("context", Some(context), MAX_CONTEXT_LEN)?;
        }
        if let Some(notes) = self.notes.take() {
            self.notes = normalized_optional("notes", Some(notes), MAX_NOTES_LEN)?;
        }
        if let Some(pos) = self.part_of_speech.take() {
            self.part_of_speech =
                normalized_optional("part_of_speech", Some(pos), MAX_PART_OF_SPEECH_LEN)?;
        }
        if let Some(tags) = self.tags.take() {
            // Tags are a set; collapse duplicates here so every store
            // sees them deduplicated, not just ones that collect into a
            // set themselves.
            let cleaned: BTreeSet<String> = tags
                .iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect();
            self.tags = Some(cleaned.into_iter().collect());
        }
        Ok(self)
    }

    pub fn apply(&self, entry: &mut VocabularyEntry, now: DateTime<Utc>) {
        if let Some(word) = &self.word {
            entry.word = word.clone();
        }
        if let Some(translation) = &self.translation {
            entry.translation = translation.clone();
        }
        if let Some(context) = &self.context {
            entry.context = Some(context.clone());
        }
        if let Some(notes) = &self.notes {
            entry.notes = Some(notes.clone());
        }
        if let Some(pos) = &self.part_of_speech {
            entry.part_of_speech = Some(pos.clone());
        }
        if let Some(strength) = self.strength {
            entry.strength = strength;
        }
        if let Some(tags) = &self.tags {
            entry.tags = tags.iter().cloned().collect();
        }
        entry.updated_at = now;
    }
}

/// Input for recording a completed study session.
#[derive(Clone, Debug, Deserialize)]
pub struct NewSession {
    pub session_type: SessionType,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub words_practiced: Option<u32>,
    #[serde(default)]
    pub accuracy_score: Option<f64>,
}

impl NewSession {
    pub fn into_session(self, owner: Uuid, now: DateTime<Utc>) -> Result<StudySession, EngineError> {
        if let Some(minutes) = self.duration_minutes {
            if minutes == 0 || minutes > MAX_SESSION_MINUTES {
                return Err(EngineError::invalid(format!(
                    "duration_minutes must be between 1 and {MAX_SESSION_MINUTES}"
                )));
            }
        }
        if let Some(score) = self.accuracy_score {
            if !(0.0..=1.0).contains(&score) || !score.is_finite() {
                return Err(EngineError::invalid(
                    "accuracy_score must be between 0.0 and 1.0",
                ));
            }
        }
        Ok(StudySession {
            id: Uuid::new_v4(),
            owner,
            session_type: self.session_type,
            duration_minutes: self.duration_minutes,
            words_practiced: self.words_practiced,
            accuracy_score: self.accuracy_score,
            completed_at: now,
        })
    }
}

fn normalized_required(field: &str, value: &str, max: usize) -> Result<String, EngineError> {
    let value = value.trim().to_lowercase();
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

fn normalized_optional(
    field: &str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, EngineError> {
    match value {
        None => Ok(None),
        Some(value) => {
            let value = value.trim().to_string();
            if value.chars().count() > max {
                return Err(EngineError::invalid(format!(
                    "{field} must be at most {max} characters"
                )));
            }
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value))
            }
        }
    }
}
