//! PostgREST access to the Supabase tables.

use reqwest::StatusCode;
use languella_engine::EngineError;
use postgrest::Postgrest;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Service-role client; row ownership is enforced by the `user_id`
/// filters every query carries, not by RLS.
pub fn service_client() -> Result<Postgrest, ApiError> {
    let supabase_url = std::env::var("SUPABASE_URL").map_err(|_| ApiError::Config("SUPABASE_URL"))?;
    let service_role_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
        .map_err(|_| ApiError::Config("SUPABASE_SERVICE_ROLE_KEY"))?;

    Ok(Postgrest::new(format!("{supabase_url}/rest/v1"))
        .insert_header("apikey", service_role_key.clone())
        .insert_header("Authorization", format!("Bearer {service_role_key}")))
}

pub fn send_failure(e: reqwest::Error) -> ApiError {
    ApiError::Store(e.to_string())
}

/// Decode a representation response into rows.
pub async fn rows<T: DeserializeOwned>(response: reqwest::Response) -> Result<Vec<T>, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(failure(status, response).await);
    }
    response.json().await.map_err(send_failure)
}

/// Decode a `.single()` response; PostgREST answers 406 when no row
/// matches.
pub async fn single<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status == StatusCode::NOT_ACCEPTABLE {
        return Err(EngineError::NotFound.into());
    }
    if !status.is_success() {
        return Err(failure(status, response).await);
    }
    response.json().await.map_err(send_failure)
}

async fn failure(status: StatusCode, response: reqwest::Response) -> ApiError {
    let body = response.text().await.unwrap_or_default();
    log::error!("postgrest returned {status}: {body}");
    ApiError::Store(format!("postgrest returned {status}"))
}
