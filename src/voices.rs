// Voice assignment: track <-> choir voice names, and cross-song lookups

use crate::song::{PracticeSection, Song, SongStore, StoreResult, Voice};
use serde::Serialize;
use std::collections::BTreeSet;

/// Add `name` to a track's labels, or remove it if already present.
/// Returns false if no voice has that track number.
pub fn toggle_voice_name(voices: &mut [Voice], track_number: usize, name: &str) -> bool {
    let Some(voice) = voices.iter_mut().find(|v| v.track_number == track_number) else {
        return false;
    };
    if let Some(pos) = voice.names.iter().position(|n| n == name) {
        voice.names.remove(pos);
    } else {
        voice.names.push(name.to_string());
    }
    true
}

/// Track numbers carrying a voice name
pub fn tracks_for_voice(voices: &[Voice], name: &str) -> Vec<usize> {
    voices
        .iter()
        .filter(|v| v.names.iter().any(|n| n == name))
        .map(|v| v.track_number)
        .collect()
}

/// A section is relevant to a voice name if it lists no tracks, or if any
/// listed track carries the name.
pub fn section_matches_voice(song: &Song, section: &PracticeSection, name: &str) -> bool {
    if section.relevant_voices.is_empty() {
        return true;
    }
    let tracks = tracks_for_voice(&song.voices, name);
    section.relevant_voices.iter().any(|t| tracks.contains(t))
}

/// A practice section tagged with the song it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct VoiceSection {
    pub song_id: String,
    pub song_title: String,
    #[serde(flatten)]
    pub section: PracticeSection,
}

/// Load every song in the index, skipping (and logging) the ones that fail
fn load_all_songs(store: &SongStore) -> StoreResult<Vec<Song>> {
    let mut songs = Vec::new();
    for summary in store.list_summaries()? {
        match store.get(&summary.id) {
            Ok(song) => songs.push(song),
            Err(e) => log::warn!("Error loading song {}: {}", summary.id, e),
        }
    }
    Ok(songs)
}

/// Sorted set of voice names used across all songs
pub fn collect_voice_names(store: &SongStore) -> StoreResult<Vec<String>> {
    let names: BTreeSet<String> = load_all_songs(store)?
        .into_iter()
        .flat_map(|song| song.voices.into_iter().flat_map(|v| v.names))
        .collect();
    Ok(names.into_iter().collect())
}

/// All sections, across songs, that matter to a voice name
pub fn sections_for_voice(store: &SongStore, name: &str) -> StoreResult<Vec<VoiceSection>> {
    let mut out = Vec::new();
    for song in load_all_songs(store)? {
        for section in &song.practice_sections {
            if section_matches_voice(&song, section, name) {
                out.push(VoiceSection {
                    song_id: song.id.clone(),
                    song_title: song.title.clone(),
                    section: section.clone(),
                });
            }
        }
    }
    Ok(out)
}
