// Shareable practice links: session state <-> URL query

use crate::playback::{Mix, DEFAULT_TEMPO_PERCENT, MAX_TEMPO_PERCENT, MIN_TEMPO_PERCENT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    #[default]
    Manual,
    Guided,
}

impl PracticeMode {
    fn as_str(&self) -> &'static str {
        match self {
            PracticeMode::Manual => "manual",
            PracticeMode::Guided => "guided",
        }
    }
}

fn default_tempo() -> u32 {
    DEFAULT_TEMPO_PERCENT
}

/// Everything needed to reopen a practice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSessionState {
    pub song_id: String,
    /// Selected track number
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default = "default_tempo")]
    pub tempo_percent: u32,
    /// dB per track
    #[serde(default)]
    pub track_volumes: BTreeMap<usize, i32>,
    #[serde(default)]
    pub enabled_tracks: BTreeMap<usize, bool>,
    #[serde(default)]
    pub practice_mode: PracticeMode,
    #[serde(default)]
    pub guided_step: Option<u8>,
}

impl PracticeSessionState {
    pub fn new(song_id: impl Into<String>) -> Self {
        Self {
            song_id: song_id.into(),
            voice_id: None,
            section_id: None,
            tempo_percent: DEFAULT_TEMPO_PERCENT,
            track_volumes: BTreeMap::new(),
            enabled_tracks: BTreeMap::new(),
            practice_mode: PracticeMode::Manual,
            guided_step: None,
        }
    }

    /// Track volumes and mutes as a playback mix
    pub fn mix(&self) -> Mix {
        Mix {
            volumes: self
                .track_volumes
                .iter()
                .map(|(&track, &db)| (track, db as f64))
                .collect(),
            enabled: self.enabled_tracks.clone(),
        }
    }

    /// Capture a playback mix, rounding volumes to whole dB
    pub fn set_mix(&mut self, mix: &Mix) {
        self.track_volumes = mix
            .volumes
            .iter()
            .map(|(&track, &db)| (track, db.round() as i32))
            .collect();
        self.enabled_tracks = mix.enabled.clone();
    }

    /// Selected track as a number, if it parses
    pub fn voice_track(&self) -> Option<usize> {
        self.voice_id.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

/// Query string for a state, leaving out everything at its default
pub fn to_query(state: &PracticeSessionState) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("song", &state.song_id);

    if let Some(voice) = state.voice_id.as_deref().filter(|v| !v.is_empty()) {
        query.append_pair("voice", voice);
    }
    if let Some(section) = state.section_id.as_deref().filter(|s| !s.is_empty()) {
        query.append_pair("section", section);
    }
    if state.tempo_percent != DEFAULT_TEMPO_PERCENT {
        query.append_pair("tempo", &state.tempo_percent.to_string());
    }
    if state.practice_mode != PracticeMode::Manual {
        query.append_pair("mode", state.practice_mode.as_str());
    }
    if state.practice_mode == PracticeMode::Guided {
        if let Some(step) = state.guided_step {
            query.append_pair("step", &step.to_string());
        }
    }
    if !state.track_volumes.is_empty() {
        let volumes = state
            .track_volumes
            .iter()
            .map(|(track, db)| format!("{}:{}", track, db))
            .collect::<Vec<_>>()
            .join(",");
        query.append_pair("volumes", &volumes);
    }
    let disabled = state
        .enabled_tracks
        .iter()
        .filter(|(_, enabled)| !**enabled)
        .map(|(track, _)| track.to_string())
        .collect::<Vec<_>>()
        .join(",");
    if !disabled.is_empty() {
        query.append_pair("disabled", &disabled);
    }

    query.finish()
}

/// Full link: `base_url?query`
pub fn encode(base_url: &str, state: &PracticeSessionState) -> String {
    format!("{}?{}", base_url, to_query(state))
}

/// Parse a link or bare query. Bad values are dropped one by one; only a
/// missing song makes the whole link unusable.
pub fn decode(input: &str) -> Option<PracticeSessionState> {
    let query = match input.find('?') {
        Some(pos) => &input[pos + 1..],
        None => input,
    };
    let query = query.split('#').next().unwrap_or_default();

    let mut song_id = None;
    let mut state = PracticeSessionState::new(String::new());

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "song" => song_id = Some(value.into_owned()),
            "voice" => state.voice_id = Some(value.into_owned()),
            "section" => state.section_id = Some(value.into_owned()),
            "tempo" => {
                if let Some(tempo) = parse_int::<u32>(&value)
                    .filter(|t| (MIN_TEMPO_PERCENT..=MAX_TEMPO_PERCENT).contains(t))
                {
                    state.tempo_percent = tempo;
                }
            }
            "mode" => match value.as_ref() {
                "manual" => state.practice_mode = PracticeMode::Manual,
                "guided" => state.practice_mode = PracticeMode::Guided,
                _ => {}
            },
            "step" => {
                if let Some(step) = parse_int::<u8>(&value).filter(|s| (1..=3).contains(s)) {
                    state.guided_step = Some(step);
                }
            }
            "volumes" => {
                for pair in value.split(',') {
                    let Some((track, db)) = pair.split_once(':') else {
                        continue;
                    };
                    if let (Some(track), Some(db)) = (parse_int::<usize>(track), parse_int::<i32>(db)) {
                        state.track_volumes.insert(track, db);
                    }
                }
            }
            "disabled" => {
                for track in value.split(',').filter_map(parse_int::<usize>) {
                    state.enabled_tracks.insert(track, false);
                }
            }
            _ => {}
        }
    }

    state.song_id = song_id?;
    Some(state)
}

fn parse_int<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}
