//! Chat-based tutoring, translation and grammar explanations.

use axum::Json;
use axum::extract::Path;
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::{DateTime, Utc};
use languella_engine::EngineError;
use languella_engine::generation::{ChatMessage, Role};
use languella_engine::prompts::{
    TUTOR_HISTORY_LIMIT, explain_request, translate_request, tutor_request,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::user::study_preferences;
use crate::{auth, llm, supabase};

const MAX_TITLE_LEN: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ConversationList {
    pub conversations: Vec<Conversation>,
}

#[derive(Serialize)]
pub struct ConversationBody {
    pub conversation: Conversation,
}

pub async fn conversations(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<ConversationList>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let client = supabase::service_client()?;
    let response = client
        .from("conversations")
        .select("*")
        .eq("user_id", claims.sub.to_string())
        .order("updated_at.desc")
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let conversations = supabase::rows(response).await?;
    Ok(Json(ConversationList { conversations }))
}

#[derive(Deserialize, Default)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn create_conversation(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<ConversationBody>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or("New Conversation");
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(EngineError::invalid(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        ))
        .into());
    }

    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4(),
        owner: claims.sub,
        title: title.to_string(),
        created_at: now,
        updated_at: now,
    };

    let body =
        serde_json::to_string(&conversation).map_err(|e| ApiError::Store(e.to_string()))?;
    let client = supabase::service_client()?;
    let response = client
        .from("conversations")
        .insert(body)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let mut created: Vec<Conversation> = supabase::rows(response).await?;
    let conversation = created
        .pop()
        .ok_or_else(|| ApiError::Store("insert returned no representation".to_string()))?;
    Ok(Json(ConversationBody { conversation }))
}

#[derive(Serialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
}

pub async fn messages(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<MessageList>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let client = supabase::service_client()?;
    let response = client
        .from("messages")
        .select("*")
        .eq("conversation_id", conversation_id.to_string())
        .eq("user_id", claims.sub.to_string())
        .order("created_at.asc")
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let messages = supabase::rows(response).await?;
    Ok(Json(MessageList { messages }))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub user_message: Message,
    pub ai_message: Message,
}

/// Persist the user's message, generate the tutor's reply with recent
/// history as context, and persist that too. A generation failure leaves
/// the user's message saved but adds nothing else.
pub async fn send_message(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;
    let owner = claims.sub;

    let client = supabase::service_client()?;
    let prefs = study_preferences(&client, owner).await?;

    let response = client
        .from("messages")
        .select("*")
        .eq("conversation_id", conversation_id.to_string())
        .eq("user_id", owner.to_string())
        .order("created_at.desc")
        .limit(TUTOR_HISTORY_LIMIT)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let mut recent: Vec<Message> = supabase::rows(response).await?;
    recent.reverse();
    let history: Vec<ChatMessage> = recent
        .into_iter()
        .map(|message| ChatMessage {
            role: message.role,
            content: message.content,
        })
        .collect();

    // Validates the content before anything is persisted.
    let generation = tutor_request(
        &prefs.study_language,
        prefs.difficulty,
        &history,
        &request.content,
    )?;

    let user_message =
        insert_message(&client, conversation_id, owner, Role::User, &request.content).await?;
    let reply = llm::generate(&generation).await?;

    let ai_message =
        insert_message(&client, conversation_id, owner, Role::Assistant, &reply).await?;

    let bump = serde_json::json!({ "updated_at": Utc::now() });
    let response = client
        .from("conversations")
        .eq("id", conversation_id.to_string())
        .eq("user_id", owner.to_string())
        .update(bump.to_string())
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let _: Vec<serde_json::Value> = supabase::rows(response).await?;

    Ok(Json(SendMessageResponse {
        user_message,
        ai_message,
    }))
}

async fn insert_message(
    client: &postgrest::Postgrest,
    conversation_id: Uuid,
    owner: Uuid,
    role: Role,
    content: &str,
) -> Result<Message, ApiError> {
    let message = Message {
        id: Uuid::new_v4(),
        conversation_id,
        owner,
        role,
        content: content.to_string(),
        created_at: Utc::now(),
    };
    let body = serde_json::to_string(&message).map_err(|e| ApiError::Store(e.to_string()))?;
    let response = client
        .from("messages")
        .insert(body)
        .execute()
        .await
        .map_err(supabase::send_failure)?;
    let mut created: Vec<Message> = supabase::rows(response).await?;
    created
        .pop()
        .ok_or_else(|| ApiError::Store("insert returned no representation".to_string()))
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    #[serde(default)]
    pub target_language: Option<String>,
}

#[derive(Serialize)]
pub struct TranslateResponse {
    pub translation: String,
}

pub async fn translate(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    auth::verify_jwt(auth.token())?;

    let target = request.target_language.as_deref().unwrap_or("English");
    let generation = translate_request(&request.text, target)?;
    let text = llm::generate(&generation).await?;
    Ok(Json(TranslateResponse {
        translation: text.trim().to_string(),
    }))
}

#[derive(Deserialize)]
pub struct ExplainRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

pub async fn explain(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let claims = auth::verify_jwt(auth.token())?;

    let client = supabase::service_client()?;
    let prefs = study_preferences(&client, claims.sub).await?;
    let generation = explain_request(&request.text, &prefs.study_language)?;
    let explanation = llm::generate(&generation).await?;
    Ok(Json(ExplainResponse { explanation }))
}
