// HTTP API: routing, shared state and error mapping

pub mod files;
pub mod practice;
pub mod sections;
pub mod songs;

use crate::config::Config;
use crate::playback::PlaybackError;
use crate::song::{SongStore, StoreError};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SongStore>,
}

impl AppState {
    pub fn new(config: Config, store: SongStore) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Run filesystem-bound store work on the blocking pool
pub async fn with_store<T, E, F>(state: &AppState, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
    F: FnOnce(&SongStore) -> Result<T, E> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || work(&store))
        .await
        .map_err(|e| anyhow::anyhow!("Store task failed: {}", e))?
        .map_err(Into::into)
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::SongNotFound)
            | ApiError::Store(StoreError::SectionNotFound)
            | ApiError::Store(StoreError::FileNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Playback(PlaybackError::NotAvailable) => StatusCode::NOT_FOUND,
            ApiError::Playback(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the application router with `/api` routes, CORS and upload limits
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/songs", get(songs::list_songs).post(songs::create_song))
        .route(
            "/songs/:id",
            get(songs::get_song)
                .put(songs::update_song)
                .delete(songs::delete_song),
        )
        .route("/songs/:id/upload/midi", post(files::upload_midi))
        .route("/songs/:id/upload/score", post(files::upload_score))
        .route("/songs/:id/upload/mp3", post(files::upload_mp3))
        .route("/songs/:id/midi", get(files::get_midi))
        .route("/songs/:id/score", get(files::get_score))
        .route("/songs/:id/mp3/:voice", get(files::get_mp3))
        .route(
            "/songs/:id/sections",
            get(sections::list_sections).post(sections::create_section),
        )
        .route(
            "/songs/:id/sections/:section_id",
            put(sections::update_section).delete(sections::delete_section),
        )
        .route("/songs/:id/playback/plan", post(practice::plan_playback))
        .route("/songs/:id/playback/render", post(practice::render_playback))
        .route("/voices", get(practice::list_voices))
        .route("/voices/:name/sections", get(practice::voice_sections))
        .route(
            "/deeplink",
            get(practice::parse_deeplink).post(practice::create_deeplink),
        );

    let cors = cors_layer(&state.config.allowed_origins);
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .nest("/api", api)
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "message": "ChoirLoop API is running",
    }))
}
