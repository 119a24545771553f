//! Vocabulary CRUD plus the practice endpoint that drives the strength
//! state machine.

use axum::Json;
use axum::extract::{Path, Query};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::Utc;
use languella_engine::store::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use languella_engine::{
    EngineError, EntryPatch, NewEntry, PracticeEvent, Strength, VocabularyEntry, apply_outcome,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{auth, supabase};

#[derive(Serialize)]
pub struct VocabularyList {
    pub vocabulary: Vec<VocabularyEntry>,
}

#[derive(Serialize)]
pub struct VocabularyBody {
    pub vocabulary: VocabularyEntry,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub strength: Option<Strength>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

pub async fn list(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<VocabularyList>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(EngineError::invalid(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}"
        ))
        .into());
    }
    let offset = params.offset.unwrap_or(0);

    let client = supabase::service_client()?;
    let mut query = client
        .from("vocabulary")
        .select("*")
        .eq("user_id", claims.sub.to_string())
        .order("created_at.desc")
        .range(offset, page_end(offset, limit));

    if let Some(language) = &params.language {
        query = query.eq("language", language.trim().to_lowercase());
    }
    if let Some(strength) = params.strength {
        query = query.eq("strength", strength.to_string());
    }
    if let Some(tag) = &params.tag {
        query = query.cs("tags", format!("{{{}}}", tag.trim()));
    }

    let response = query.execute().await.map_err(supabase::send_failure)?;
    let vocabulary = supabase::rows(response).await?;
    Ok(Json(VocabularyList { vocabulary }))
}

pub async fn add(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<NewEntry>,
) -> Result<Json<VocabularyBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let entry = request.into_entry(claims.sub, Utc::now())?;

    let body = serde_json::to_string(&entry).map_err(|e| ApiError::Store(e.to_string()))?;
    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .insert(body)
        .execute()
        .await
        .map_err(supabase::send_failure)?;

    // Unique constraint on (user_id, language, word)
    if response.status() == reqwest::StatusCode::CONFLICT {
        return Err(EngineError::invalid("word already exists in your vocabulary").into());
    }
    let mut created: Vec<VocabularyEntry> = supabase::rows(response).await?;
    let vocabulary = created.pop().ok_or_else(|| {
        ApiError::Store("insert returned no representation".to_string())
    })?;
    Ok(Json(VocabularyBody { vocabulary }))
}

pub async fn update(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EntryPatch>,
) -> Result<Json<VocabularyBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let patch = patch.validated()?;

    let mut payload =
        serde_json::to_value(&patch).map_err(|e| ApiError::Store(e.to_string()))?;
    payload["updated_at"] = serde_json::json!(Utc::now());

    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .eq("id", id.to_string())
        .eq("user_id", claims.sub.to_string())
        .update(payload.to_string())
        .execute()
        .await
        .map_err(supabase::send_failure)?;

    let mut updated: Vec<VocabularyEntry> = supabase::rows(response).await?;
    let vocabulary = updated.pop().ok_or(EngineError::NotFound)?;
    Ok(Json(VocabularyBody { vocabulary }))
}

pub async fn remove(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .eq("id", id.to_string())
        .eq("user_id", claims.sub.to_string())
        .delete()
        .execute()
        .await
        .map_err(supabase::send_failure)?;

    // Practice events go with the entry via ON DELETE CASCADE.
    let deleted: Vec<serde_json::Value> = supabase::rows(response).await?;
    if deleted.is_empty() {
        return Err(EngineError::NotFound.into());
    }
    Ok(Json(serde_json::json!({
        "message": "Vocabulary word deleted successfully"
    })))
}

/// Inclusive end of the requested page. The offset is user-supplied and
/// unbounded, so the add must saturate instead of overflowing.
fn page_end(offset: usize, limit: usize) -> usize {
    offset.saturating_add(limit - 1)
}

#[derive(Serialize)]
pub struct TagList {
    pub tags: Vec<String>,
}

pub async fn tags(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<TagList>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    #[derive(Deserialize)]
    struct TagRow {
        #[serde(default)]
        tags: Vec<String>,
    }

    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .select("tags")
        .eq("user_id", claims.sub.to_string())
        .execute()
        .await
        .map_err(supabase::send_failure)?;

    let rows: Vec<TagRow> = supabase::rows(response).await?;
    let mut tags: Vec<String> = rows.into_iter().flat_map(|row| row.tags).collect();
    tags.sort();
    tags.dedup();
    Ok(Json(TagList { tags }))
}

#[derive(Deserialize)]
pub struct PracticeRequest {
    pub correct: bool,
    #[serde(default)]
    pub time_taken_seconds: Option<u32>,
}

/// Record one practice outcome against an entry.
///
/// The strength/counter update is a conditional write filtered on the
/// prior `times_practiced`, so two concurrent calls can never both apply
/// the same transition; the loser sees zero affected rows and gets a 409
/// to retry. The review event is appended only after the entry update
/// commits, so a lost race leaves no stray events.
pub async fn practice(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(request): Json<PracticeRequest>,
) -> Result<Json<VocabularyBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let owner = claims.sub;
    let now = Utc::now();

    let client = supabase::service_client()?;
    let response = client
        .from("vocabulary")
        .select("*")
        .eq("id", id.to_string())
        .eq("user_id", owner.to_string())
        .single()
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let entry: VocabularyEntry = supabase::single(response).await?;

    let prior = entry.times_practiced;
    let new_strength = apply_outcome(entry.strength, request.correct, prior);

    let update = serde_json::json!({
        "strength": new_strength,
        "times_practiced": prior + 1,
        "last_practiced_at": now,
        "updated_at": now,
    });
    let response = client
        .from("vocabulary")
        .eq("id", id.to_string())
        .eq("user_id", owner.to_string())
        .eq("times_practiced", prior.to_string())
        .update(update.to_string())
        .execute()
        .await
        .map_err(supabase::send_failure)?;

    let mut updated: Vec<VocabularyEntry> = supabase::rows(response).await?;
    let vocabulary = updated.pop().ok_or(EngineError::Conflict)?;

    let event = PracticeEvent {
        id: Uuid::new_v4(),
        vocabulary_id: id,
        owner,
        correct: request.correct,
        time_taken_seconds: request.time_taken_seconds,
        occurred_at: now,
    };
    let body = serde_json::to_string(&event).map_err(|e| ApiError::Store(e.to_string()))?;
    let response = client
        .from("flashcard_reviews")
        .insert(body)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let _: Vec<serde_json::Value> = supabase::rows(response).await?;

    log::debug!(
        "practice recorded: entry={id} correct={} {} -> {}",
        request.correct,
        entry.strength,
        vocabulary.strength
    );
    Ok(Json(VocabularyBody { vocabulary }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_end_is_inclusive() {
        assert_eq!(page_end(0, 50), 49);
        assert_eq!(page_end(100, 25), 124);
        assert_eq!(page_end(0, 1), 0);
    }

    #[test]
    fn page_end_saturates_on_huge_offsets() {
        assert_eq!(page_end(usize::MAX, 50), usize::MAX);
        assert_eq!(page_end(usize::MAX - 10, 50), usize::MAX);
    }
}
