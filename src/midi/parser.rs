// MIDI file parser producing per-track notes in seconds

use serde::Serialize;
use std::collections::HashMap;

/// Tempo used when a file declares none
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;
const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// A note with times in seconds at the file's own tempo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MidiNote {
    pub onset: f64,
    pub pitch: u8,
    /// Scientific pitch name, middle C = "C4"
    pub name: String,
    pub duration: f64,
    /// Normalized to 0..1
    pub velocity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MidiTrack {
    /// Track name meta event, empty if absent
    pub name: String,
    /// Channel of the first note
    pub channel: Option<u8>,
    pub notes: Vec<MidiNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempoEvent {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

/// Decoded MIDI file. `tracks[i]` is the file's i-th track, including tracks without notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MidiSong {
    pub tracks: Vec<MidiTrack>,
    pub base_tempo_bpm: f64,
    pub duration_seconds: f64,
    pub ticks_per_beat: u16,
    pub tempo_map: Vec<TempoEvent>,
}

/// Scientific pitch name of a MIDI key (60 -> "C4")
pub fn note_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// Convert a tick position to seconds using the tempo map.
pub fn tick_to_seconds(tick: u64, ticks_per_beat: u16, tempo_map: &[TempoEvent]) -> f64 {
    let tpb = ticks_per_beat as f64;
    let mut seconds = 0.0;
    let mut last_tick = 0u64;
    let mut usec_per_beat = DEFAULT_USEC_PER_BEAT as f64;

    for te in tempo_map {
        if te.tick >= tick {
            break;
        }
        let delta_ticks = te.tick - last_tick;
        seconds += (delta_ticks as f64 / tpb) * (usec_per_beat / 1_000_000.0);
        last_tick = te.tick;
        usec_per_beat = te.microseconds_per_beat as f64;
    }

    let delta_ticks = tick - last_tick;
    seconds += (delta_ticks as f64 / tpb) * (usec_per_beat / 1_000_000.0);
    seconds
}

/// Ticks-to-seconds for either timing mode of the header
enum Clock<'a> {
    Metrical { ticks_per_beat: u16, tempo_map: &'a [TempoEvent] },
    Timecode { ticks_per_second: f64 },
}

impl Clock<'_> {
    fn seconds(&self, tick: u64) -> f64 {
        match self {
            Clock::Metrical { ticks_per_beat, tempo_map } => {
                tick_to_seconds(tick, *ticks_per_beat, tempo_map)
            }
            Clock::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
        }
    }
}

/// A note still waiting for its note-off: (pitch, channel) -> (velocity, start_tick)
type ActiveNotes = HashMap<(u8, u8), (u8, u64)>;

struct TickNote {
    pitch: u8,
    velocity: u8,
    start_tick: u64,
    end_tick: u64,
}

/// Parse MIDI bytes into per-track notes.
pub fn parse_midi_bytes(data: &[u8]) -> anyhow::Result<MidiSong> {
    let smf = midly::Smf::parse(data)
        .map_err(|e| anyhow::anyhow!("Failed to parse MIDI: {}", e))?;

    // Tempo events may live in any track (usually the first)
    let mut tempo_map: Vec<TempoEvent> = Vec::new();
    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        for event in track {
            current_tick += event.delta.as_int() as u64;
            if let midly::TrackEventKind::Meta(midly::MetaMessage::Tempo(t)) = event.kind {
                tempo_map.push(TempoEvent {
                    tick: current_tick,
                    microseconds_per_beat: t.as_int(),
                });
            }
        }
    }
    tempo_map.sort_by_key(|t| t.tick);
    tempo_map.dedup_by_key(|t| t.tick);

    let base_tempo_bpm = tempo_map
        .first()
        .filter(|t| t.microseconds_per_beat > 0)
        .map(|t| 60_000_000.0 / t.microseconds_per_beat as f64)
        .unwrap_or(DEFAULT_TEMPO_BPM);

    let mut ticks_per_beat: u16 = 480;
    let clock = match smf.header.timing {
        midly::Timing::Metrical(tpb) => {
            ticks_per_beat = tpb.as_int();
            Clock::Metrical { ticks_per_beat, tempo_map: &tempo_map }
        }
        midly::Timing::Timecode(fps, subframe) => Clock::Timecode {
            ticks_per_second: fps.as_f32() as f64 * subframe as f64,
        },
    };

    let mut tracks = Vec::with_capacity(smf.tracks.len());
    let mut duration_seconds: f64 = 0.0;

    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        let mut name = String::new();
        let mut channel: Option<u8> = None;
        let mut active_notes: ActiveNotes = HashMap::new();
        let mut finished: Vec<TickNote> = Vec::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                midly::TrackEventKind::Meta(midly::MetaMessage::TrackName(bytes)) if name.is_empty() => {
                    name = String::from_utf8_lossy(bytes).trim().to_string();
                }
                midly::TrackEventKind::Midi { channel: ch, message } => {
                    let ch = ch.as_int();
                    match message {
                        midly::MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            let pitch = key.as_int();
                            channel.get_or_insert(ch);
                            // Re-strike finalizes the sounding note first
                            if let Some((old_vel, old_start)) = active_notes.remove(&(pitch, ch)) {
                                finished.push(TickNote {
                                    pitch,
                                    velocity: old_vel,
                                    start_tick: old_start,
                                    end_tick: current_tick,
                                });
                            }
                            active_notes.insert((pitch, ch), (vel.as_int(), current_tick));
                        }
                        midly::MidiMessage::NoteOn { key, .. } | midly::MidiMessage::NoteOff { key, .. } => {
                            let pitch = key.as_int();
                            if let Some((vel, start)) = active_notes.remove(&(pitch, ch)) {
                                finished.push(TickNote {
                                    pitch,
                                    velocity: vel,
                                    start_tick: start,
                                    end_tick: current_tick,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // Finalize any remaining active notes at the last tick
        for ((pitch, _ch), (vel, start)) in active_notes.drain() {
            finished.push(TickNote {
                pitch,
                velocity: vel,
                start_tick: start,
                end_tick: current_tick,
            });
        }

        finished.sort_by_key(|n| (n.start_tick, n.pitch));

        let notes: Vec<MidiNote> = finished
            .into_iter()
            .map(|n| {
                let onset = clock.seconds(n.start_tick);
                let end = clock.seconds(n.end_tick);
                MidiNote {
                    onset,
                    pitch: n.pitch,
                    name: note_name(n.pitch),
                    duration: (end - onset).max(0.0),
                    velocity: n.velocity as f32 / 127.0,
                }
            })
            .collect();

        if let Some(end) = notes.iter().map(|n| n.onset + n.duration).reduce(f64::max) {
            duration_seconds = duration_seconds.max(end);
        }

        tracks.push(MidiTrack { name, channel, notes });
    }

    if tempo_map.is_empty() {
        tempo_map.push(TempoEvent { tick: 0, microseconds_per_beat: DEFAULT_USEC_PER_BEAT });
    }

    Ok(MidiSong {
        tracks,
        base_tempo_bpm,
        duration_seconds,
        ticks_per_beat,
        tempo_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::testing::{build_smf, two_voice_smf, Ev};

    #[test]
    fn note_names() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(84), "C6");
    }

    #[test]
    fn tick_conversion_follows_tempo_changes() {
        let map = vec![
            TempoEvent { tick: 0, microseconds_per_beat: 500_000 },
            TempoEvent { tick: 960, microseconds_per_beat: 1_000_000 },
        ];
        assert!((tick_to_seconds(480, 480, &map) - 0.5).abs() < 1e-9);
        assert!((tick_to_seconds(960, 480, &map) - 1.0).abs() < 1e-9);
        assert!((tick_to_seconds(1440, 480, &map) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn parses_tracks_and_notes() {
        let song = parse_midi_bytes(&two_voice_smf()).unwrap();

        assert_eq!(song.tracks.len(), 3);
        assert_eq!(song.ticks_per_beat, 480);
        assert!((song.base_tempo_bpm - 120.0).abs() < 1e-9);
        assert!(song.tracks[0].notes.is_empty());

        let soprano = &song.tracks[1];
        assert_eq!(soprano.name, "Soprano");
        assert_eq!(soprano.channel, Some(0));
        assert_eq!(soprano.notes.len(), 4);
        assert_eq!(soprano.notes[1].name, "C5");
        assert!((soprano.notes[1].onset - 0.5).abs() < 1e-9);
        assert!((soprano.notes[1].duration - 0.5).abs() < 1e-9);
        assert!((soprano.notes[1].velocity - 100.0 / 127.0).abs() < 1e-6);

        let alto = &song.tracks[2];
        assert_eq!(alto.channel, Some(1));
        assert_eq!(alto.notes.len(), 2);
        assert!((alto.notes[1].onset - 1.0).abs() < 1e-9);

        assert!((song.duration_seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_tempo_defaults_to_120() {
        let data = build_smf(vec![vec![Ev::Note { at: 0, len: 960, pitch: 60, ch: 0 }]]);
        let song = parse_midi_bytes(&data).unwrap();
        assert_eq!(song.base_tempo_bpm, DEFAULT_TEMPO_BPM);
        assert!((song.duration_seconds - 1.0).abs() < 1e-9);
        assert_eq!(song.tempo_map.len(), 1);
    }

    #[test]
    fn slower_tempo_stretches_seconds() {
        let data = build_smf(vec![vec![
            Ev::Tempo { at: 0, bpm: 60 },
            Ev::Note { at: 480, len: 480, pitch: 64, ch: 2 },
        ]]);
        let song = parse_midi_bytes(&data).unwrap();
        assert!((song.base_tempo_bpm - 60.0).abs() < 1e-9);
        let note = &song.tracks[0].notes[0];
        assert!((note.onset - 1.0).abs() < 1e-9);
        assert!((note.duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_midi_bytes(b"RIFF....WAVE").is_err());
    }
}
