// Practice section routes

use super::{with_store, ApiResult, AppState};
use crate::song::{NewSection, SectionPatch};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub async fn list_sections(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let sections = with_store(&state, move |store| store.list_sections(&id)).await?;
    Ok(Json(json!({ "sections": sections })))
}

pub async fn create_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(new): Json<NewSection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let section = with_store(&state, move |store| store.add_section(&id, new)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "section": section }))))
}

pub async fn update_section(
    State(state): State<AppState>,
    Path((id, section_id)): Path<(String, String)>,
    Json(patch): Json<SectionPatch>,
) -> ApiResult<Json<Value>> {
    let section = with_store(&state, move |store| {
        store.update_section(&id, &section_id, patch)
    })
    .await?;
    Ok(Json(json!({ "section": section })))
}

pub async fn delete_section(
    State(state): State<AppState>,
    Path((id, section_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    with_store(&state, move |store| store.delete_section(&id, &section_id)).await?;
    Ok(Json(json!({ "message": "Practice section deleted successfully" })))
}
