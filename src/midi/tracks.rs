// Track metadata for voice configuration

use super::MidiSong;
use crate::song::Voice;

/// Common choir and accompaniment parts, matched by substring on the lowercase track name
const VOICE_PATTERNS: &[(&str, &[&str])] = &[
    ("Soprano", &["soprano", "sop"]),
    ("Alto", &["alto", "alt"]),
    ("Tenor", &["tenor", "ten"]),
    ("Bass", &["bass", "bas"]),
    ("Piano", &["piano", "pno", "accomp"]),
    ("Organ", &["organ", "org"]),
];

/// Suggest a voice name based on a track name.
pub fn suggest_voice_name(track_name: &str) -> Option<&'static str> {
    let lower = track_name.to_lowercase();
    VOICE_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(voice, _)| *voice)
}

/// Build the initial voice list: one entry per track that has notes.
pub fn extract_voices(song: &MidiSong) -> Vec<Voice> {
    song.tracks
        .iter()
        .enumerate()
        .filter(|(_, track)| !track.notes.is_empty())
        .map(|(index, track)| {
            let original_track_name = if track.name.is_empty() {
                format!("Track {}", index + 1)
            } else {
                track.name.clone()
            };
            let first_name = suggest_voice_name(&original_track_name)
                .map(str::to_string)
                .unwrap_or_else(|| original_track_name.clone());

            Voice {
                track_number: index,
                names: vec![first_name],
                original_track_name,
                note_count: track.notes.len(),
                channel: track.channel,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::parse_midi_bytes;
    use crate::midi::testing::{build_smf, two_voice_smf, Ev};

    #[test]
    fn suggestions() {
        assert_eq!(suggest_voice_name("SOPRANO 1"), Some("Soprano"));
        assert_eq!(suggest_voice_name("Alt"), Some("Alto"));
        assert_eq!(suggest_voice_name("Tenore"), Some("Tenor"));
        assert_eq!(suggest_voice_name("Accompaniment"), Some("Piano"));
        assert_eq!(suggest_voice_name("Flute"), None);
    }

    #[test]
    fn voices_skip_empty_tracks_and_keep_indices() {
        let song = parse_midi_bytes(&two_voice_smf()).unwrap();
        let voices = extract_voices(&song);

        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].track_number, 1);
        assert_eq!(voices[0].names, vec!["Soprano".to_string()]);
        assert_eq!(voices[0].note_count, 4);
        assert_eq!(voices[1].track_number, 2);
        assert_eq!(voices[1].original_track_name, "Alto Chorus");
        assert_eq!(voices[1].names, vec!["Alto".to_string()]);
        assert_eq!(voices[1].channel, Some(1));
    }

    #[test]
    fn unnamed_tracks_get_numbered_labels() {
        let song = parse_midi_bytes(&build_smf(vec![
            vec![Ev::Note { at: 0, len: 480, pitch: 60, ch: 0 }],
            vec![Ev::Name("Flute"), Ev::Note { at: 0, len: 480, pitch: 79, ch: 3 }],
        ]))
        .unwrap();
        let voices = extract_voices(&song);

        assert_eq!(voices[0].original_track_name, "Track 1");
        assert_eq!(voices[0].names, vec!["Track 1".to_string()]);
        assert_eq!(voices[1].names, vec!["Flute".to_string()]);
    }
}
