//! Languella HTTP backend.
//!
//! Thin axum layer over Supabase (PostgREST) persistence and the
//! `languella-engine` vocabulary logic. Every route authenticates with a
//! Supabase JWT and scopes queries to the caller's rows.

use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod chat;
mod error;
mod llm;
mod practice;
mod supabase;
mod user;
mod vocabulary;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/vocabulary", get(vocabulary::list).post(vocabulary::add))
        .route("/vocabulary/tags", get(vocabulary::tags))
        .route(
            "/vocabulary/{id}",
            put(vocabulary::update).delete(vocabulary::remove),
        )
        .route("/vocabulary/{id}/practice", post(vocabulary::practice))
        .route("/practice/daily-review", get(practice::daily_review))
        .route(
            "/practice/generate-sentences",
            post(practice::generate_sentences),
        )
        .route("/practice/quiz", post(practice::quiz))
        .route(
            "/practice/sessions",
            get(practice::list_sessions).post(practice::create_session),
        )
        .route(
            "/chat/conversations",
            get(chat::conversations).post(chat::create_conversation),
        )
        .route(
            "/chat/conversations/{id}/messages",
            get(chat::messages).post(chat::send_message),
        )
        .route("/chat/translate", post(chat::translate))
        .route("/chat/explain", post(chat::explain))
        .route("/user/profile", get(user::profile).put(user::update_profile))
        .route("/user/stats", get(user::stats))
        .route("/user/account", delete(user::delete_account))
        .layer(CompressionLayer::new())
        .layer(cors);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    log::info!("listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
