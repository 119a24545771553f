//! Profile, preferences and account-level operations.

use axum::Json;
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::{DateTime, Utc};
use languella_engine::{Difficulty, EngineError};
use postgrest::Postgrest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{auth, supabase};

pub const DEFAULT_STUDY_LANGUAGE: &str = "spanish";
const MAX_DISPLAY_NAME_LEN: usize = 50;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub study_language: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<Difficulty>,
    #[serde(default)]
    pub dark_mode: Option<bool>,
    #[serde(default)]
    pub grammar_coloring: Option<bool>,
    #[serde(default)]
    pub translation_overlay: Option<bool>,
    #[serde(default)]
    pub streak_count: Option<u32>,
    #[serde(default)]
    pub total_words_learned: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ProfileBody {
    pub profile: UserProfile,
}

/// The study language and difficulty generation prompts depend on, with
/// the original defaults when the profile has gaps.
pub struct StudyPreferences {
    pub study_language: String,
    pub difficulty: Difficulty,
}

pub async fn study_preferences(
    client: &Postgrest,
    user_id: Uuid,
) -> Result<StudyPreferences, ApiError> {
    #[derive(Deserialize)]
    struct PrefsRow {
        #[serde(default)]
        study_language: Option<String>,
        #[serde(default)]
        difficulty_level: Option<Difficulty>,
    }

    let response = client
        .from("user_profiles")
        .select("study_language,difficulty_level")
        .eq("id", user_id.to_string())
        .single()
        .execute()
        .await
        .map_err(supabase::send_failure)?;

    let row = match supabase::single::<PrefsRow>(response).await {
        Ok(row) => row,
        Err(ApiError::Engine(EngineError::NotFound)) => PrefsRow {
            study_language: None,
            difficulty_level: None,
        },
        Err(e) => return Err(e),
    };

    Ok(StudyPreferences {
        study_language: row
            .study_language
            .unwrap_or_else(|| DEFAULT_STUDY_LANGUAGE.to_string()),
        difficulty: row.difficulty_level.unwrap_or_default(),
    })
}

pub async fn profile(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<ProfileBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let client = supabase::service_client()?;
    let response = client
        .from("user_profiles")
        .select("*")
        .eq("id", claims.sub.to_string())
        .single()
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let profile = supabase::single(response).await?;
    Ok(Json(ProfileBody { profile }))
}

/// Fields a user may change about their profile. `grammar_coloring` is
/// the canonical name for the grammar-highlighting preference.
#[derive(Deserialize, Serialize, Default)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar_coloring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_overlay: Option<bool>,
}

pub async fn update_profile(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(mut request): Json<ProfileUpdate>,
) -> Result<Json<ProfileBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    if let Some(name) = request.display_name.take() {
        let name = name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(EngineError::invalid(format!(
                "display_name must be between 1 and {MAX_DISPLAY_NAME_LEN} characters"
            ))
            .into());
        }
        request.display_name = Some(name);
    }
    if let Some(language) = request.study_language.take() {
        let language = language.trim().to_lowercase();
        if language.is_empty() {
            return Err(EngineError::invalid("study_language must not be empty").into());
        }
        request.study_language = Some(language);
    }

    let mut payload =
        serde_json::to_value(&request).map_err(|e| ApiError::Store(e.to_string()))?;
    let fields = payload
        .as_object()
        .map(|object| object.len())
        .unwrap_or_default();
    if fields == 0 {
        return Err(EngineError::invalid("no valid fields to update").into());
    }
    payload["updated_at"] = serde_json::json!(Utc::now());

    let client = supabase::service_client()?;
    let response = client
        .from("user_profiles")
        .eq("id", claims.sub.to_string())
        .update(payload.to_string())
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let mut updated: Vec<UserProfile> = supabase::rows(response).await?;
    let profile = updated.pop().ok_or(EngineError::NotFound)?;
    Ok(Json(ProfileBody { profile }))
}

#[derive(Serialize)]
pub struct StatsBody {
    pub stats: Stats,
}

#[derive(Serialize)]
pub struct Stats {
    pub streak_count: u32,
    pub total_words_learned: u32,
    pub vocabulary_count: usize,
    pub conversation_count: usize,
    pub total_study_time: u64,
    pub member_since: Option<DateTime<Utc>>,
}

pub async fn stats(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<StatsBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let owner = claims.sub.to_string();

    let client = supabase::service_client()?;

    let response = client
        .from("user_profiles")
        .select("*")
        .eq("id", &owner)
        .single()
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let profile: UserProfile = supabase::single(response).await?;

    #[derive(Deserialize)]
    struct IdRow {
        #[allow(dead_code)]
        id: Uuid,
    }
    let response = client
        .from("vocabulary")
        .select("id")
        .eq("user_id", &owner)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let vocabulary: Vec<IdRow> = supabase::rows(response).await?;

    let response = client
        .from("conversations")
        .select("id")
        .eq("user_id", &owner)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let conversations: Vec<IdRow> = supabase::rows(response).await?;

    #[derive(Deserialize)]
    struct DurationRow {
        #[serde(default)]
        duration_minutes: Option<u32>,
    }
    let response = client
        .from("study_sessions")
        .select("duration_minutes")
        .eq("user_id", &owner)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let sessions: Vec<DurationRow> = supabase::rows(response).await?;
    let total_study_time: u64 = sessions
        .iter()
        .map(|row| u64::from(row.duration_minutes.unwrap_or(0)))
        .sum();

    Ok(Json(StatsBody {
        stats: Stats {
            streak_count: profile.streak_count.unwrap_or(0),
            total_words_learned: profile.total_words_learned.unwrap_or(0),
            vocabulary_count: vocabulary.len(),
            conversation_count: conversations.len(),
            total_study_time,
            member_since: profile.created_at,
        },
    }))
}

/// Hard-delete the account; every owned row goes with the profile via
/// ON DELETE CASCADE.
pub async fn delete_account(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let client = supabase::service_client()?;
    let response = client
        .from("user_profiles")
        .eq("id", claims.sub.to_string())
        .delete()
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let _: Vec<serde_json::Value> = supabase::rows(response).await?;

    log::info!("account deleted: {}", claims.sub);
    Ok(Json(serde_json::json!({
        "message": "Account deleted successfully"
    })))
}
