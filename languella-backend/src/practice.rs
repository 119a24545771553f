//! Daily review, exercise generation and study-session history.

use axum::Json;
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::{Duration, Utc};
use languella_engine::generation::{
    DEFAULT_QUIZ_QUESTIONS, MAX_PRACTICE_WORDS, MAX_QUIZ_QUESTIONS, PracticeSheet, PromptWord,
    QuizSheet, build_practice_request, build_quiz_request, parse_practice_sheet, parse_quiz_sheet,
    select_quiz_words,
};
use languella_engine::practice::DEFAULT_SESSION_HISTORY;
use languella_engine::review::{DEFAULT_REVIEW_LIMIT, REVIEW_INTERVAL_HOURS, review_order};
use languella_engine::{Difficulty, EngineError, NewSession, StudySession, VocabularyEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::user::study_preferences;
use crate::vocabulary::VocabularyList;
use crate::{auth, llm, supabase};

/// Words due for review: never practiced, or not practiced in the last
/// 24 hours. The store filters the due set; ordering (weakest strength
/// first, then oldest practice with never-practiced ahead) is the
/// engine's comparator.
pub async fn daily_review(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<VocabularyList>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let horizon = (Utc::now() - Duration::hours(REVIEW_INTERVAL_HOURS)).to_rfc3339();

    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .select("*")
        .eq("user_id", claims.sub.to_string())
        .or(format!(
            "last_practiced_at.is.null,last_practiced_at.lt.{horizon}"
        ))
        .execute()
        .await
        .map_err(supabase::send_failure)?;

    let mut vocabulary: Vec<VocabularyEntry> = supabase::rows(response).await?;
    vocabulary.sort_by(review_order);
    vocabulary.truncate(DEFAULT_REVIEW_LIMIT);
    Ok(Json(VocabularyList { vocabulary }))
}

#[derive(Deserialize)]
pub struct GenerateSentencesRequest {
    pub vocabulary_ids: Vec<Uuid>,
}

pub async fn generate_sentences(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<GenerateSentencesRequest>,
) -> Result<Json<PracticeSheet>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    if request.vocabulary_ids.is_empty() || request.vocabulary_ids.len() > MAX_PRACTICE_WORDS {
        return Err(EngineError::invalid(format!(
            "vocabulary_ids must contain between 1 and {MAX_PRACTICE_WORDS} ids"
        ))
        .into());
    }

    #[derive(Deserialize)]
    struct WordRow {
        word: String,
        translation: String,
        language: String,
    }

    let ids: Vec<String> = request.vocabulary_ids.iter().map(Uuid::to_string).collect();
    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .select("word,translation,language")
        .eq("user_id", claims.sub.to_string())
        .in_("id", ids)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let rows: Vec<WordRow> = supabase::rows(response).await?;
    if rows.is_empty() {
        return Err(EngineError::invalid("invalid vocabulary words").into());
    }

    let prefs = study_preferences(&client, claims.sub).await?;
    // Entries carry their own language tag; the profile's study language
    // only fills in when a row somehow lacks one.
    let language = rows
        .first()
        .map(|row| row.language.clone())
        .unwrap_or(prefs.study_language);
    let words: Vec<PromptWord> = rows
        .into_iter()
        .map(|row| PromptWord {
            word: row.word,
            translation: row.translation,
        })
        .collect();

    let generation = build_practice_request(&words, &language, prefs.difficulty)?;
    let text = llm::generate(&generation).await?;
    let sheet = parse_practice_sheet(&text)?;
    Ok(Json(sheet))
}

#[derive(Deserialize, Default)]
pub struct QuizRequest {
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

pub async fn quiz(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<QuizRequest>,
) -> Result<Json<QuizSheet>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let count = validated_quiz_count(request.count)?;

    // Over-fetch for variety, then keep the least practiced.
    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .select("*")
        .eq("user_id", claims.sub.to_string())
        .order("times_practiced.asc")
        .limit(count * 2)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let entries: Vec<VocabularyEntry> = supabase::rows(response).await?;
    if entries.is_empty() {
        return Err(EngineError::invalid("not enough vocabulary words for quiz").into());
    }

    let prefs = study_preferences(&client, claims.sub).await?;
    let difficulty = request.difficulty.unwrap_or(prefs.difficulty);
    let language = entries
        .first()
        .map(|entry| entry.language.clone())
        .unwrap_or(prefs.study_language);
    let words = select_quiz_words(&entries, count);

    let generation = build_quiz_request(&words, &language, difficulty, count)?;
    let text = llm::generate(&generation).await?;
    let sheet = parse_quiz_sheet(&text)?;
    Ok(Json(sheet))
}

/// Bounds-check the requested question count before any query runs.
fn validated_quiz_count(requested: Option<usize>) -> Result<usize, EngineError> {
    let count = requested.unwrap_or(DEFAULT_QUIZ_QUESTIONS);
    if count == 0 || count > MAX_QUIZ_QUESTIONS {
        return Err(EngineError::invalid(format!(
            "count must be between 1 and {MAX_QUIZ_QUESTIONS}"
        )));
    }
    Ok(count)
}

#[derive(Serialize)]
pub struct SessionBody {
    pub session: StudySession,
}

#[derive(Serialize)]
pub struct SessionList {
    pub sessions: Vec<StudySession>,
}

pub async fn create_session(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<NewSession>,
) -> Result<Json<SessionBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let session = request.into_session(claims.sub, Utc::now())?;

    let body = serde_json::to_string(&session).map_err(|e| ApiError::Store(e.to_string()))?;
    let client = supabase::service_client()?;
    let response = client
        .from("study_sessions")
        .insert(body)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let mut created: Vec<StudySession> = supabase::rows(response).await?;
    let session = created
        .pop()
        .ok_or_else(|| ApiError::Store("insert returned no representation".to_string()))?;
    Ok(Json(SessionBody { session }))
}

pub async fn list_sessions(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<SessionList>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let client = supabase::service_client()?;
    let response = client
        .from("study_sessions")
        .select("*")
        .eq("user_id", claims.sub.to_string())
        .order("completed_at.desc")
        .limit(DEFAULT_SESSION_HISTORY)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let sessions = supabase::rows(response).await?;
    Ok(Json(SessionList { sessions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_count_is_checked_before_any_fetch() {
        assert!(matches!(
            validated_quiz_count(Some(0)),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            validated_quiz_count(Some(MAX_QUIZ_QUESTIONS + 1)),
            Err(EngineError::InvalidArgument(_))
        ));
        assert_eq!(validated_quiz_count(None).unwrap(), DEFAULT_QUIZ_QUESTIONS);
        assert_eq!(validated_quiz_count(Some(MAX_QUIZ_QUESTIONS)).unwrap(), MAX_QUIZ_QUESTIONS);
    }
}
