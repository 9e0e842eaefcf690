// Uploaded song files: one fixed filename per role inside the song folder

use super::{sanitize_file_stem, Song, SongStore, StoreError, StoreResult};
use crate::midi;
use std::path::Path;

pub const MIDI_FILENAME: &str = "song.mid";
const MIDI_EXTENSIONS: &[&str] = &["mid", "midi"];
const SCORE_EXTENSIONS: &[&str] = &["xml", "mxl", "musicxml", "pdf"];
const MP3_EXTENSIONS: &[&str] = &["mp3"];

/// What an uploaded file is used for
#[derive(Debug, Clone, PartialEq)]
pub enum FileRole {
    Midi,
    Score { extension: String },
    Mp3 { voice: String },
}

impl FileRole {
    /// Validate a MIDI upload by its client filename
    pub fn midi(client_filename: &str) -> StoreResult<Self> {
        check_extension(client_filename, MIDI_EXTENSIONS)?;
        Ok(Self::Midi)
    }

    /// Validate a score upload; the stored name keeps the client's extension
    pub fn score(client_filename: &str) -> StoreResult<Self> {
        let extension = check_extension(client_filename, SCORE_EXTENSIONS)?;
        Ok(Self::Score { extension })
    }

    /// Validate a per-voice audio upload
    pub fn mp3(client_filename: &str, voice: &str) -> StoreResult<Self> {
        check_extension(client_filename, MP3_EXTENSIONS)?;
        if sanitize_file_stem(voice).is_empty() {
            return Err(StoreError::Validation("voice is required".into()));
        }
        Ok(Self::Mp3 { voice: voice.trim().to_string() })
    }

    /// Fixed stored filename for this role
    pub fn filename(&self) -> String {
        match self {
            FileRole::Midi => MIDI_FILENAME.to_string(),
            FileRole::Score { extension } => format!("score.{}", extension),
            FileRole::Mp3 { voice } => format!("{}.mp3", sanitize_file_stem(voice)),
        }
    }
}

/// Content type used when serving a stored file
pub fn media_type(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("mid") | Some("midi") => "audio/midi",
        Some("mxl") => "application/vnd.recordare.musicxml",
        Some("xml") | Some("musicxml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn check_extension(filename: &str, allowed: &[&str]) -> StoreResult<String> {
    match extension_of(filename) {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(ext),
        _ => Err(StoreError::Validation(format!(
            "Invalid file type. Must be one of: {}",
            allowed.iter().map(|e| format!(".{}", e)).collect::<Vec<_>>().join(", ")
        ))),
    }
}

impl SongStore {
    /// Write a file into the song folder under its role's fixed name
    pub fn save_file(&self, song_id: &str, role: &FileRole, bytes: &[u8]) -> StoreResult<String> {
        let song_dir = self.song_dir(song_id)?;
        if !song_dir.exists() {
            return Err(StoreError::SongNotFound);
        }

        let filename = role.filename();
        std::fs::write(song_dir.join(&filename), bytes)?;
        log::info!("Stored {} ({} bytes) for song {}", filename, bytes.len(), song_id);
        Ok(filename)
    }

    pub fn read_file(&self, song_id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        // Stored names never contain separators
        if filename.contains('/') || filename.contains('\\') || filename.starts_with('.') {
            return Err(StoreError::FileNotFound(filename.to_string()));
        }
        let path = self.song_dir(song_id)?.join(filename);
        if !path.is_file() {
            return Err(StoreError::FileNotFound(filename.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    /// Store an uploaded MIDI file and refresh the song's voice list.
    ///
    /// A file that does not parse is still kept; the previous voices stay.
    pub fn attach_midi(&self, song_id: &str, bytes: &[u8]) -> StoreResult<Song> {
        self.get(song_id)?;
        let filename = self.save_file(song_id, &FileRole::Midi, bytes)?;

        let voices = match midi::parse_midi_bytes(bytes) {
            Ok(parsed) => Some(midi::extract_voices(&parsed)),
            Err(e) => {
                log::warn!("Error parsing MIDI for song {}: {}", song_id, e);
                None
            }
        };

        self.update(song_id, None, move |song| {
            song.midi_file = Some(filename);
            if let Some(voices) = voices {
                song.voices = voices;
            }
            Ok(())
        })
    }

    pub fn attach_score(&self, song_id: &str, role: &FileRole, bytes: &[u8]) -> StoreResult<Song> {
        self.get(song_id)?;
        let filename = self.save_file(song_id, role, bytes)?;
        self.update(song_id, None, move |song| {
            song.score_file = Some(filename);
            Ok(())
        })
    }

    pub fn attach_mp3(&self, song_id: &str, role: &FileRole, bytes: &[u8]) -> StoreResult<Song> {
        let voice = match role {
            FileRole::Mp3 { voice } => voice.clone(),
            _ => return Err(StoreError::Validation("voice is required".into())),
        };
        self.get(song_id)?;
        let filename = self.save_file(song_id, role, bytes)?;
        self.update(song_id, None, move |song| {
            song.mp3_files.insert(voice, filename);
            Ok(())
        })
    }

    /// Bytes of the song's MIDI file
    pub fn read_midi(&self, song_id: &str) -> StoreResult<Vec<u8>> {
        let song = self.get(song_id)?;
        let filename = song
            .midi_file
            .ok_or_else(|| StoreError::FileNotFound("MIDI file".to_string()))?;
        self.read_file(song_id, &filename)
    }
}
