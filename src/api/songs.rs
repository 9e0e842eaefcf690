// Song document routes

use super::{with_store, ApiResult, AppState};
use crate::song::{NewSong, SongPatch};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub async fn list_songs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let songs = with_store(&state, |store| store.list_summaries()).await?;
    Ok(Json(json!({ "songs": songs })))
}

pub async fn create_song(
    State(state): State<AppState>,
    Json(new): Json<NewSong>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let song = with_store(&state, move |store| store.create(new)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "song": song }))))
}

pub async fn get_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let song = with_store(&state, move |store| store.get(&id)).await?;
    Ok(Json(json!({ "song": song })))
}

pub async fn update_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<SongPatch>,
) -> ApiResult<Json<Value>> {
    let song = with_store(&state, move |store| store.apply_patch(&id, patch)).await?;
    Ok(Json(json!({ "song": song })))
}

pub async fn delete_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    with_store(&state, move |store| store.delete(&id)).await?;
    Ok(Json(json!({ "message": "Song deleted successfully" })))
}
