// Small SMF builder for tests

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

pub const TICKS_PER_BEAT: u16 = 480;

#[derive(Debug, Clone, Copy)]
pub enum Ev {
    Name(&'static str),
    Tempo { at: u32, bpm: u32 },
    Note { at: u32, len: u32, pitch: u8, ch: u8 },
}

/// Encode tracks of absolute-tick events as a format 1 file at 480 ticks per beat
pub fn build_smf(tracks: Vec<Vec<Ev>>) -> Vec<u8> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_BEAT)),
    ));

    for events in tracks {
        // (tick, order, kind); note-offs sort before note-ons on the same tick
        let mut timeline: Vec<(u32, u8, TrackEventKind<'static>)> = Vec::new();
        for ev in events {
            match ev {
                Ev::Name(name) => {
                    timeline.push((0, 0, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))));
                }
                Ev::Tempo { at, bpm } => {
                    let usec = 60_000_000 / bpm;
                    timeline.push((at, 0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(usec)))));
                }
                Ev::Note { at, len, pitch, ch } => {
                    timeline.push((
                        at,
                        2,
                        TrackEventKind::Midi {
                            channel: u4::new(ch),
                            message: MidiMessage::NoteOn { key: u7::new(pitch), vel: u7::new(100) },
                        },
                    ));
                    timeline.push((
                        at + len,
                        1,
                        TrackEventKind::Midi {
                            channel: u4::new(ch),
                            message: MidiMessage::NoteOff { key: u7::new(pitch), vel: u7::new(0) },
                        },
                    ));
                }
            }
        }
        timeline.sort_by_key(|(tick, order, _)| (*tick, *order));

        let mut track = Vec::with_capacity(timeline.len() + 1);
        let mut last = 0u32;
        for (tick, _, kind) in timeline {
            track.push(TrackEvent { delta: u28::new(tick - last), kind });
            last = tick;
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    let mut out = Vec::new();
    smf.write_std(&mut out).expect("in-memory MIDI write");
    out
}

/// Conductor track at 120 BPM, a four-quarter Soprano line and a two-half Alto line (2 s)
pub fn two_voice_smf() -> Vec<u8> {
    let beat = TICKS_PER_BEAT as u32;
    build_smf(vec![
        vec![Ev::Name("Ave Maria"), Ev::Tempo { at: 0, bpm: 120 }],
        vec![
            Ev::Name("Soprano"),
            Ev::Note { at: 0, len: beat, pitch: 72, ch: 0 },
            Ev::Note { at: beat, len: beat, pitch: 72, ch: 0 },
            Ev::Note { at: 2 * beat, len: beat, pitch: 74, ch: 0 },
            Ev::Note { at: 3 * beat, len: beat, pitch: 76, ch: 0 },
        ],
        vec![
            Ev::Name("Alto Chorus"),
            Ev::Note { at: 0, len: 2 * beat, pitch: 69, ch: 1 },
            Ev::Note { at: 2 * beat, len: 2 * beat, pitch: 67, ch: 1 },
        ],
    ])
}
