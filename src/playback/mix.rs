// Per-track volume and mute, and the guided practice presets

use super::PlaybackError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TRACK_VOLUME_DB: f64 = -10.0;
pub const MIN_TRACK_VOLUME_DB: f64 = -60.0;
pub const MAX_TRACK_VOLUME_DB: f64 = 0.0;
/// Gain of a disabled track
pub const MUTED_DB: f64 = -100.0;

const FOCUS_MINE_DB: f64 = -5.0;
const FOCUS_OTHERS_DB: f64 = -30.0;

/// Track volumes in dB and enabled flags, keyed by track number.
/// Tracks missing from a map use the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mix {
    #[serde(default)]
    pub volumes: BTreeMap<usize, f64>,
    #[serde(default)]
    pub enabled: BTreeMap<usize, bool>,
}

impl Mix {
    /// Every listed track enabled at the default volume
    pub fn for_tracks(tracks: &[usize]) -> Self {
        Self {
            volumes: tracks.iter().map(|&t| (t, DEFAULT_TRACK_VOLUME_DB)).collect(),
            enabled: tracks.iter().map(|&t| (t, true)).collect(),
        }
    }

    pub fn volume_db(&self, track: usize) -> f64 {
        self.volumes.get(&track).copied().unwrap_or(DEFAULT_TRACK_VOLUME_DB)
    }

    pub fn is_enabled(&self, track: usize) -> bool {
        self.enabled.get(&track).copied().unwrap_or(true)
    }

    /// Gain the synthesizer for a track should run at
    pub fn gain_db(&self, track: usize) -> f64 {
        if self.is_enabled(track) {
            self.volume_db(track)
        } else {
            MUTED_DB
        }
    }

    /// Set a user volume, clamped to the slider range
    pub fn set_volume(&mut self, track: usize, db: f64) {
        self.volumes
            .insert(track, db.clamp(MIN_TRACK_VOLUME_DB, MAX_TRACK_VOLUME_DB));
    }

    pub fn set_enabled(&mut self, track: usize, enabled: bool) {
        self.enabled.insert(track, enabled);
    }

    /// Preset for a guided step, built from scratch over `tracks`
    pub fn guided(step: GuidedStep, my_track: usize, tracks: &[usize]) -> Self {
        let mut mix = Self::default();
        for &track in tracks {
            let mine = track == my_track;
            let (volume, enabled) = match step {
                GuidedStep::Focus if mine => (FOCUS_MINE_DB, true),
                GuidedStep::Focus => (FOCUS_OTHERS_DB, true),
                GuidedStep::Together => (DEFAULT_TRACK_VOLUME_DB, true),
                GuidedStep::SingAlone if mine => (MUTED_DB, false),
                GuidedStep::SingAlone => (DEFAULT_TRACK_VOLUME_DB, true),
            };
            mix.volumes.insert(track, volume);
            mix.enabled.insert(track, enabled);
        }
        mix
    }
}

/// The three guided practice steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GuidedStep {
    /// Own part loud, everyone else quiet
    Focus = 1,
    /// Everyone at the same level
    Together = 2,
    /// Own part silent
    SingAlone = 3,
}

impl TryFrom<u8> for GuidedStep {
    type Error = PlaybackError;

    fn try_from(step: u8) -> Result<Self, Self::Error> {
        match step {
            1 => Ok(Self::Focus),
            2 => Ok(Self::Together),
            3 => Ok(Self::SingAlone),
            other => Err(PlaybackError::InvalidGuidedStep(other)),
        }
    }
}

impl From<GuidedStep> for u8 {
    fn from(step: GuidedStep) -> u8 {
        step as u8
    }
}
