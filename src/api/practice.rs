// Cross-song voice lookups, playback planning/rendering and deeplinks

use super::{with_store, ApiError, ApiResult, AppState};
use crate::deeplink::{self, PracticeMode, PracticeSessionState};
use crate::midi;
use crate::playback::{
    GuidedStep, PlaybackError, PlaybackSession, SectionBounds, DEFAULT_LOOP_COUNT,
    DEFAULT_TEMPO_PERCENT,
};
use crate::song::{SongStore, StoreError};
use crate::voices;
use axum::extract::{Path, RawQuery, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

// ============================================================================
// Voice Routes
// ============================================================================

pub async fn list_voices(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let names = with_store(&state, |store| voices::collect_voice_names(store)).await?;
    Ok(Json(json!({ "voices": names })))
}

pub async fn voice_sections(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let sections =
        with_store(&state, move |store| voices::sections_for_voice(store, &name)).await?;
    Ok(Json(json!({ "sections": sections })))
}

// ============================================================================
// Playback Routes
// ============================================================================

/// Playback settings sent by the practice view
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackRequest {
    pub tempo_percent: u32,
    pub loop_count: u32,
    /// Stored section to play; takes precedence over `section`
    pub section_id: Option<String>,
    pub section: Option<SectionBounds>,
    pub track_volumes: BTreeMap<usize, f64>,
    pub enabled_tracks: BTreeMap<usize, bool>,
    pub practice_mode: PracticeMode,
    pub guided_step: Option<u8>,
    /// Track number of the singer's own part
    pub voice: Option<usize>,
}

impl Default for PlaybackRequest {
    fn default() -> Self {
        Self {
            tempo_percent: DEFAULT_TEMPO_PERCENT,
            loop_count: DEFAULT_LOOP_COUNT,
            section_id: None,
            section: None,
            track_volumes: BTreeMap::new(),
            enabled_tracks: BTreeMap::new(),
            practice_mode: PracticeMode::Manual,
            guided_step: None,
            voice: None,
        }
    }
}

/// Load the song's MIDI and configure a session from the request
fn prepare_session(
    store: &SongStore,
    beats_per_measure: u32,
    song_id: &str,
    request: PlaybackRequest,
) -> ApiResult<PlaybackSession> {
    let song = store.get(song_id)?;
    let midi = match &song.midi_file {
        Some(filename) => {
            let bytes = store.read_file(song_id, filename)?;
            let parsed = midi::parse_midi_bytes(&bytes)
                .map_err(|e| PlaybackError::Midi(e.to_string()))?;
            Some(parsed)
        }
        None => None,
    };

    let mut session = PlaybackSession::new(midi, beats_per_measure)?;
    if !song.voices.is_empty() {
        session = session.with_voice_tracks(song.voices.iter().map(|v| v.track_number).collect());
    }
    session.set_tempo(request.tempo_percent)?;
    session.set_loop_count(request.loop_count)?;

    let section = match &request.section_id {
        Some(section_id) => Some(SectionBounds::from(
            song.section(section_id).ok_or(StoreError::SectionNotFound)?,
        )),
        None => request.section,
    };
    session.select_section(section);

    match request.practice_mode {
        PracticeMode::Guided => {
            let step = GuidedStep::try_from(request.guided_step.unwrap_or(1))?;
            session.apply_guided_step(step, request.voice)?;
        }
        PracticeMode::Manual => {
            for (&track, &db) in &request.track_volumes {
                session.set_volume(track, db);
            }
            for (&track, &enabled) in &request.enabled_tracks {
                session.set_enabled(track, enabled);
            }
        }
    }
    Ok(session)
}

pub async fn plan_playback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PlaybackRequest>,
) -> ApiResult<Json<Value>> {
    let beats = state.config.beats_per_measure;
    let session =
        with_store(&state, move |store| prepare_session(store, beats, &id, request)).await?;
    let plan = session.preview()?;
    Ok(Json(json!({ "plan": plan, "mix": session.settings().mix })))
}

pub async fn render_playback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PlaybackRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.loop_count == 0 {
        return Err(PlaybackError::InfiniteRender.into());
    }
    let beats = state.config.beats_per_measure;
    let song_id = id.clone();
    let mut session =
        with_store(&state, move |store| prepare_session(store, beats, &song_id, request)).await?;
    let max_seconds = state.config.max_render_seconds;
    crate::playback::check_render_length(&session, max_seconds)?;

    let sample_rate = state.config.render_sample_rate;
    let wav = tokio::task::spawn_blocking(move || {
        let wav = crate::playback::render_wav(&mut session, sample_rate, max_seconds);
        session.dispose();
        wav
    })
    .await
    .map_err(|e| anyhow::anyhow!("Render task failed: {}", e))??;

    log::info!("Rendered practice track for song {} ({} bytes)", id, wav.len());
    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav))
}

// ============================================================================
// Deeplink Routes
// ============================================================================

pub async fn create_deeplink(
    State(state): State<AppState>,
    Json(session): Json<PracticeSessionState>,
) -> ApiResult<Json<Value>> {
    if session.song_id.trim().is_empty() {
        return Err(ApiError::BadRequest("song_id is required".into()));
    }
    let url = deeplink::encode(&state.config.app_base_url, &session);
    Ok(Json(json!({ "url": url })))
}

pub async fn parse_deeplink(RawQuery(query): RawQuery) -> Json<Value> {
    let session = deeplink::decode(query.as_deref().unwrap_or_default());
    Json(json!({ "session": session }))
}
