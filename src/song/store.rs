// JSON document store: one folder per song plus a flat summary index

use super::{NewSong, Song, SongPatch, SongSummary};
use super::metadata::{MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const INDEX_FILE: &str = "index.json";
pub const SONGS_DIR: &str = "songs";
pub const DOCUMENT_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Song not found")]
    SongNotFound,

    #[error("Practice section not found")]
    SectionNotFound,

    #[error("{0} not found")]
    FileNotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Song was modified concurrently (expected revision {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Index entries are summaries; older data directories hold bare song IDs.
#[derive(Deserialize)]
#[serde(untagged)]
enum IndexEntry {
    Summary(SongSummary),
    Id(String),
}

/// Song document store
///
/// Every write (document + index entry) happens under `write_lock`, so the
/// index cannot drift from the documents while a single process owns the
/// data folder. Callers that may race with other processes pass the revision
/// they read to `update`.
pub struct SongStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl SongStore {
    /// Open or create the data folder layout
    pub fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(data_dir.join(SONGS_DIR))?;

        let index_path = data_dir.join(INDEX_FILE);
        if !index_path.exists() {
            std::fs::write(&index_path, "[]")?;
        }

        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Folder of a song. IDs that are not UUIDs never resolve to a path.
    pub fn song_dir(&self, id: &str) -> StoreResult<PathBuf> {
        Ok(self.data_dir.join(SONGS_DIR).join(canonical_id(id)?))
    }

    fn document_path(&self, id: &str) -> StoreResult<PathBuf> {
        Ok(self.song_dir(id)?.join(DOCUMENT_FILE))
    }

    /// Load a song document
    pub fn get(&self, id: &str) -> StoreResult<Song> {
        let path = self.document_path(id)?;
        if !path.exists() {
            return Err(StoreError::SongNotFound);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Summaries of all songs, in creation order
    pub fn list_summaries(&self) -> StoreResult<Vec<SongSummary>> {
        let contents = std::fs::read_to_string(self.data_dir.join(INDEX_FILE))?;
        let entries: Vec<IndexEntry> = serde_json::from_str(&contents)?;

        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                IndexEntry::Summary(summary) => summaries.push(summary),
                IndexEntry::Id(id) => match self.get(&id) {
                    Ok(song) => summaries.push(SongSummary::from(&song)),
                    Err(e) => log::warn!("Skipping index entry {}: {}", id, e),
                },
            }
        }
        Ok(summaries)
    }

    /// Create a new, empty song
    pub fn create(&self, new: NewSong) -> StoreResult<Song> {
        let title = validate_title(&new.title)?;
        let description = validate_description(new.description.as_deref().unwrap_or(""))?;

        let now = Utc::now();
        let song = Song {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            midi_file: None,
            score_file: None,
            mp3_files: Default::default(),
            voices: Vec::new(),
            practice_sections: Vec::new(),
            revision: 1,
            created_at: now,
            updated_at: now,
        };

        let _guard = self.write_lock.lock();
        std::fs::create_dir_all(self.song_dir(&song.id)?)?;
        self.write_document(&song)?;
        self.sync_index_entry(&song)?;

        log::info!("Created song {} ({})", song.id, song.title);
        Ok(song)
    }

    /// Read-modify-write a song document.
    ///
    /// The mutation runs on a fresh copy; if it fails nothing is written.
    /// On success `revision` and `updated_at` are bumped and the index entry
    /// is rewritten.
    pub fn update_with<T, F>(
        &self,
        id: &str,
        expected_revision: Option<u64>,
        mutate: F,
    ) -> StoreResult<(Song, T)>
    where
        F: FnOnce(&mut Song) -> StoreResult<T>,
    {
        let _guard = self.write_lock.lock();

        let mut song = self.get(id)?;
        if let Some(expected) = expected_revision {
            if expected != song.revision {
                return Err(StoreError::Conflict {
                    expected,
                    found: song.revision,
                });
            }
        }

        let out = mutate(&mut song)?;
        song.revision += 1;
        song.updated_at = Utc::now();

        self.write_document(&song)?;
        self.sync_index_entry(&song)?;
        Ok((song, out))
    }

    pub fn update<F>(&self, id: &str, expected_revision: Option<u64>, mutate: F) -> StoreResult<Song>
    where
        F: FnOnce(&mut Song) -> StoreResult<()>,
    {
        self.update_with(id, expected_revision, mutate).map(|(song, ())| song)
    }

    /// Apply a field-level patch (title, description, voices)
    pub fn apply_patch(&self, id: &str, patch: SongPatch) -> StoreResult<Song> {
        let SongPatch { title, description, voices, revision } = patch;
        self.update(id, revision, move |song| {
            if let Some(title) = title {
                song.title = validate_title(&title)?;
            }
            if let Some(description) = description {
                song.description = validate_description(&description)?;
            }
            if let Some(voices) = voices {
                song.voices = voices;
            }
            Ok(())
        })
    }

    /// Delete a song folder (document and files) and its index entry
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        // Folder names and index ids are the canonical hyphenated lowercase form
        let id = canonical_id(id)?;
        let song_dir = self.song_dir(&id)?;

        let _guard = self.write_lock.lock();
        if !song_dir.exists() {
            return Err(StoreError::SongNotFound);
        }
        std::fs::remove_dir_all(&song_dir)?;

        let mut index = self.list_summaries()?;
        index.retain(|s| s.id != id);
        self.write_index(&index)?;

        log::info!("Deleted song {}", id);
        Ok(())
    }

    /// Rebuild the index from the song folders on disk.
    /// Folders without a readable document are skipped.
    pub fn rescan(&self) -> StoreResult<usize> {
        let _guard = self.write_lock.lock();

        let mut songs: Vec<Song> = Vec::new();
        for entry in std::fs::read_dir(self.data_dir.join(SONGS_DIR))? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let document = path.join(DOCUMENT_FILE);
            if !document.exists() {
                continue;
            }

            match std::fs::read_to_string(&document)
                .map_err(StoreError::from)
                .and_then(|c| serde_json::from_str::<Song>(&c).map_err(StoreError::from))
            {
                Ok(song) => songs.push(song),
                Err(e) => log::warn!("Skipping unreadable song document {:?}: {}", document, e),
            }
        }

        songs.sort_by_key(|s| s.created_at);
        let index: Vec<SongSummary> = songs.iter().map(SongSummary::from).collect();
        self.write_index(&index)?;

        log::info!("Rescanned {} songs", index.len());
        Ok(index.len())
    }

    fn write_document(&self, song: &Song) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(song)?;
        replace_file(&self.document_path(&song.id)?, json.as_bytes())
    }

    fn write_index(&self, index: &[SongSummary]) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(index)?;
        replace_file(&self.data_dir.join(INDEX_FILE), json.as_bytes())
    }

    /// Insert or replace the index entry of one song
    fn sync_index_entry(&self, song: &Song) -> StoreResult<()> {
        let mut index = self.list_summaries()?;
        let summary = SongSummary::from(song);
        match index.iter_mut().find(|s| s.id == song.id) {
            Some(existing) => *existing = summary,
            None => index.push(summary),
        }
        self.write_index(&index)
    }
}

/// Any accepted UUID spelling (uppercase, simple, braced, urn) as stored on disk
/// Write beside the target and rename over it so readers never see a partial file.
/// Callers hold the write lock.
fn replace_file(path: &Path, contents: &[u8]) -> StoreResult<()> {
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, contents)?;
    std::fs::rename(&staging, path)?;
    Ok(())
}

fn canonical_id(id: &str) -> StoreResult<String> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|_| StoreError::SongNotFound)
}

pub fn validate_title(title: &str) -> StoreResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StoreError::Validation("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(StoreError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

pub fn validate_description(description: &str) -> StoreResult<String> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(StoreError::Validation(format!(
            "description must be at most {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(description.to_string())
}
