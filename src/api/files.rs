// Upload and download routes for MIDI, score and per-voice MP3 files

use super::{with_store, ApiError, ApiResult, AppState};
use crate::song::{media_type, FileRole, StoreError};
use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;

/// A multipart form with at most one file part
struct UploadForm {
    file: Option<(String, Bytes)>,
    text: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart, file_fields: &[&str]) -> ApiResult<Self> {
        let mut form = UploadForm { file: None, text: HashMap::new() };
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if file_fields.contains(&name.as_str()) {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?;
                form.file = Some((filename, bytes));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?;
                form.text.insert(name, value);
            }
        }
        Ok(form)
    }

    fn require_file(&mut self, field: &str) -> ApiResult<(String, Bytes)> {
        self.file
            .take()
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))
    }
}

pub async fn upload_midi(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (filename, bytes) = UploadForm::read(multipart, &["midi_file", "midi"])
        .await?
        .require_file("midi_file")?;
    FileRole::midi(&filename)?;

    let song = with_store(&state, move |store| store.attach_midi(&id, &bytes)).await?;
    Ok(Json(json!({
        "message": "MIDI file uploaded successfully",
        "midi_file": song.midi_file,
        "voices": song.voices,
    })))
}

pub async fn upload_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (filename, bytes) = UploadForm::read(multipart, &["score_file", "score"])
        .await?
        .require_file("score_file")?;
    let role = FileRole::score(&filename)?;

    let song = with_store(&state, move |store| store.attach_score(&id, &role, &bytes)).await?;
    Ok(Json(json!({
        "message": "Score file uploaded successfully",
        "score_file": song.score_file,
    })))
}

pub async fn upload_mp3(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut form = UploadForm::read(multipart, &["mp3"]).await?;
    let (filename, bytes) = form.require_file("mp3")?;
    let voice = form.text.get("voice").cloned().unwrap_or_default();
    let role = FileRole::mp3(&filename, &voice)?;

    let stored = role.filename();
    with_store(&state, move |store| store.attach_mp3(&id, &role, &bytes)).await?;
    Ok(Json(json!({
        "message": "MP3 uploaded successfully",
        "file": stored,
    })))
}

fn file_response(filename: &str, bytes: Vec<u8>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, media_type(filename))], bytes)
}

pub async fn get_midi(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let bytes = with_store(&state, move |store| store.read_midi(&id)).await?;
    Ok(file_response(crate::song::MIDI_FILENAME, bytes))
}

pub async fn get_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (filename, bytes) = with_store(&state, move |store| {
        let filename = store
            .get(&id)?
            .score_file
            .ok_or_else(|| StoreError::FileNotFound("Score file".to_string()))?;
        let bytes = store.read_file(&id, &filename)?;
        Ok::<_, StoreError>((filename, bytes))
    })
    .await?;
    Ok(file_response(&filename, bytes))
}

pub async fn get_mp3(
    State(state): State<AppState>,
    Path((id, voice)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let (filename, bytes) = with_store(&state, move |store| {
        let filename = store
            .get(&id)?
            .mp3_files
            .get(&voice)
            .cloned()
            .ok_or_else(|| StoreError::FileNotFound(format!("MP3 for {}", voice)))?;
        let bytes = store.read_file(&id, &filename)?;
        Ok::<_, StoreError>((filename, bytes))
    })
    .await?;
    Ok(file_response(&filename, bytes))
}
