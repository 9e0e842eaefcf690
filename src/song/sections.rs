// Practice sections stored inside the song document

use super::{NewSection, PracticeSection, SectionPatch, SongStore, StoreError, StoreResult};
use super::metadata::MAX_LABEL_CHARS;
use chrono::Utc;
use uuid::Uuid;

impl SongStore {
    pub fn list_sections(&self, song_id: &str) -> StoreResult<Vec<PracticeSection>> {
        Ok(self.get(song_id)?.practice_sections)
    }

    pub fn add_section(&self, song_id: &str, new: NewSection) -> StoreResult<PracticeSection> {
        let label = validate_label(&new.label)?;
        for (field, value) in [
            ("start_measure", new.start_measure),
            ("start_beat", new.start_beat),
            ("end_measure", new.end_measure),
            ("end_beat", new.end_beat),
        ] {
            validate_position(field, value)?;
        }

        let section = PracticeSection {
            id: Uuid::new_v4().to_string(),
            label,
            start_measure: new.start_measure,
            start_beat: new.start_beat,
            end_measure: new.end_measure,
            end_beat: new.end_beat,
            relevant_voices: new.relevant_voices,
            created_at: Utc::now(),
        };

        let stored = section.clone();
        self.update(song_id, None, move |song| {
            song.practice_sections.push(stored);
            Ok(())
        })?;

        log::info!("Added section '{}' to song {}", section.label, song_id);
        Ok(section)
    }

    /// Partial update; only the fields present in `patch` change
    pub fn update_section(
        &self,
        song_id: &str,
        section_id: &str,
        patch: SectionPatch,
    ) -> StoreResult<PracticeSection> {
        let (_, section) = self.update_with(song_id, None, |song| {
            let section = song
                .practice_sections
                .iter_mut()
                .find(|s| s.id == section_id)
                .ok_or(StoreError::SectionNotFound)?;

            if let Some(label) = &patch.label {
                section.label = validate_label(label)?;
            }
            if let Some(v) = patch.start_measure {
                section.start_measure = validate_position("start_measure", v)?;
            }
            if let Some(v) = patch.start_beat {
                section.start_beat = validate_position("start_beat", v)?;
            }
            if let Some(v) = patch.end_measure {
                section.end_measure = validate_position("end_measure", v)?;
            }
            if let Some(v) = patch.end_beat {
                section.end_beat = validate_position("end_beat", v)?;
            }
            if let Some(voices) = patch.relevant_voices {
                section.relevant_voices = voices;
            }
            Ok(section.clone())
        })?;
        Ok(section)
    }

    pub fn delete_section(&self, song_id: &str, section_id: &str) -> StoreResult<()> {
        self.update(song_id, None, |song| {
            let before = song.practice_sections.len();
            song.practice_sections.retain(|s| s.id != section_id);
            if song.practice_sections.len() == before {
                return Err(StoreError::SectionNotFound);
            }
            Ok(())
        })?;

        log::info!("Deleted section {} from song {}", section_id, song_id);
        Ok(())
    }
}

fn validate_label(label: &str) -> StoreResult<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(StoreError::Validation("label must not be empty".into()));
    }
    if label.chars().count() > MAX_LABEL_CHARS {
        return Err(StoreError::Validation(format!(
            "label must be at most {} characters",
            MAX_LABEL_CHARS
        )));
    }
    Ok(label.to_string())
}

/// Measures and beats are 1-based
fn validate_position(field: &str, value: u32) -> StoreResult<u32> {
    if value < 1 {
        return Err(StoreError::Validation(format!("{} must be at least 1", field)));
    }
    Ok(value)
}
