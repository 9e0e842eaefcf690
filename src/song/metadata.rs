// Song metadata structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use chrono::{DateTime, Utc};

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const MAX_LABEL_CHARS: usize = 255;

/// Sanitize a voice name for use in filenames.
/// Replaces spaces, slashes, backslashes, colons and dots with underscores.
pub fn sanitize_file_stem(name: &str) -> String {
    name.trim()
        .replace(' ', "_")
        .replace('/', "_")
        .replace('\\', "_")
        .replace(':', "_")
        .replace('.', "_")
}

/// Complete song document, stored as `songs/<id>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Song {
    /// Unique song ID (UUID v4), also the folder name
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Stored MIDI filename, always `song.mid` once uploaded
    #[serde(default)]
    pub midi_file: Option<String>,

    /// Stored score filename (`score.<ext>`)
    #[serde(default)]
    pub score_file: Option<String>,

    /// Voice name -> stored audio filename
    #[serde(default)]
    pub mp3_files: BTreeMap<String, String>,

    /// Track-to-voice assignments, in track order
    #[serde(default)]
    pub voices: Vec<Voice>,

    #[serde(default)]
    pub practice_sections: Vec<PracticeSection>,

    /// Incremented on every write. Documents written before revisions existed load as 0.
    #[serde(default)]
    pub revision: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Song {
    pub fn section(&self, section_id: &str) -> Option<&PracticeSection> {
        self.practice_sections.iter().find(|s| s.id == section_id)
    }

    pub fn voice(&self, track_number: usize) -> Option<&Voice> {
        self.voices.iter().find(|v| v.track_number == track_number)
    }
}

/// A MIDI track with the choir voices it is assigned to.
/// Many names may map to one track, and a name may appear on several tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "VoiceRecord")]
pub struct Voice {
    pub track_number: usize,
    pub names: Vec<String>,
    pub original_track_name: String,
    pub note_count: usize,
    pub channel: Option<u8>,
}

/// On-disk shape of a voice; older documents carry a single `name`.
#[derive(Deserialize)]
struct VoiceRecord {
    track_number: usize,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    original_track_name: Option<String>,
    #[serde(default)]
    note_count: usize,
    #[serde(default)]
    channel: Option<u8>,
}

impl From<VoiceRecord> for Voice {
    fn from(record: VoiceRecord) -> Self {
        let fallback = format!("Track {}", record.track_number + 1);
        let names = if record.names.is_empty() {
            vec![record.name.unwrap_or_else(|| fallback.clone())]
        } else {
            record.names
        };
        Self {
            track_number: record.track_number,
            names,
            original_track_name: record.original_track_name.unwrap_or(fallback),
            note_count: record.note_count,
            channel: record.channel,
        }
    }
}

/// A measure:beat range used for focused looping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PracticeSection {
    pub id: String,
    pub label: String,
    pub start_measure: u32,
    pub start_beat: u32,
    pub end_measure: u32,
    pub end_beat: u32,
    /// Track numbers this section matters for; empty means everyone
    #[serde(default)]
    pub relevant_voices: Vec<usize>,
    pub created_at: DateTime<Utc>,
}

/// Index entry for list display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Song> for SongSummary {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id.clone(),
            title: song.title.clone(),
            description: song.description.clone(),
            updated_at: song.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSong {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Field-level song update. `revision`, when present, must match the stored one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SongPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub voices: Option<Vec<Voice>>,
    pub revision: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSection {
    pub label: String,
    pub start_measure: u32,
    pub start_beat: u32,
    pub end_measure: u32,
    pub end_beat: u32,
    #[serde(default)]
    pub relevant_voices: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionPatch {
    pub label: Option<String>,
    pub start_measure: Option<u32>,
    pub start_beat: Option<u32>,
    pub end_measure: Option<u32>,
    pub end_beat: Option<u32>,
    pub relevant_voices: Option<Vec<usize>>,
}
