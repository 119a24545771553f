//! OpenRouter text-generation client.
//!
//! The provider returns plain text with no guarantees; callers feed it
//! through the engine's schema validation when they expect structure. Any
//! non-success here is `GenerationUnavailable` and leaves no vocabulary
//! state behind.

use std::sync::LazyLock;

use languella_engine::EngineError;
use languella_engine::generation::GenerationRequest;
use serde::Deserialize;

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

static HTTP: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Send a generation request and return the raw completion text.
pub async fn generate(request: &GenerationRequest) -> Result<String, EngineError> {
    let api_key = std::env::var("OPENROUTER_API_KEY")
        .map_err(|_| EngineError::GenerationUnavailable("OPENROUTER_API_KEY is not set".into()))?;
    let referer =
        std::env::var("FRONTEND_URL").unwrap_or_else(|_| "https://languella.app".to_string());

    let response = HTTP
        .post(OPENROUTER_URL)
        .bearer_auth(api_key)
        .header("HTTP-Referer", referer)
        .header("X-Title", "Languella")
        .json(request)
        .send()
        .await
        .map_err(|e| EngineError::GenerationUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(EngineError::GenerationUnavailable(format!(
            "provider returned {}",
            response.status()
        )));
    }

    let completion: Completion = response
        .json()
        .await
        .map_err(|e| EngineError::GenerationUnavailable(e.to_string()))?;

    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| {
            EngineError::MalformedGenerationResponse("completion has no choices".into())
        })
}
