// Practice playback session: builds parts, schedules loops, drives the synths

use super::synth::SynthVoice;
use super::timing::{plan_loops, LoopPlan, SectionBounds, TimeGrid};
use super::transport::{EventId, Transport};
use super::{
    validate_loop_count, validate_tempo, GuidedStep, Mix, PlaybackError, DEFAULT_LOOP_COUNT,
    DEFAULT_TEMPO_PERCENT,
};
use crate::midi::MidiSong;
use serde::Serialize;

const CLICK_ACCENT_PITCH: u8 = 84; // C6
const CLICK_PITCH: u8 = 72; // C5
const CLICK_VOLUME_DB: f64 = -6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
    Finished,
}

/// What the transport carries
#[derive(Debug, Clone, PartialEq)]
pub enum Cue {
    Click { accent: bool },
    Note { track: usize, pitch: u8, duration: f64, velocity: f32 },
    PassStart { number: u32 },
    AutoStop,
}

/// Reported back from `advance`, with the clock time it happened at
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Click { at: f64, accent: bool },
    Note { at: f64, track: usize, pitch: u8, duration: f64 },
    Pass { at: f64, number: u32 },
    Finished { at: f64 },
}

/// Notes of one track inside the section, re-based to the section start
#[derive(Debug, Clone)]
struct Part {
    track: usize,
    notes: Vec<PartNote>,
}

#[derive(Debug, Clone)]
struct PartNote {
    time: f64,
    pitch: u8,
    duration: f64,
    velocity: f32,
}

/// User-facing settings; changes apply on the next `play` from idle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSettings {
    pub tempo_percent: u32,
    pub loop_count: u32,
    pub section: Option<SectionBounds>,
    pub mix: Mix,
}

/// Owns the transport, one synth per track and everything scheduled on them.
/// Every way out of playback goes through the same teardown.
pub struct PlaybackSession {
    midi: MidiSong,
    beats_per_measure: u32,
    voice_tracks: Vec<usize>,
    settings: PlaybackSettings,
    transport: Transport<Cue>,
    voices: Vec<SynthVoice>,
    click: SynthVoice,
    parts: Vec<Part>,
    scheduled: Vec<EventId>,
    auto_stop: Option<EventId>,
    plan: Option<LoopPlan>,
    status: PlaybackStatus,
    current_loop: u32,
    disposed: bool,
}

impl PlaybackSession {
    pub fn new(midi: Option<MidiSong>, beats_per_measure: u32) -> Result<Self, PlaybackError> {
        let midi = midi.ok_or(PlaybackError::NotAvailable)?;
        let voice_tracks: Vec<usize> = midi
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.notes.is_empty())
            .map(|(i, _)| i)
            .collect();
        let voices = vec![SynthVoice::new(super::DEFAULT_TRACK_VOLUME_DB); midi.tracks.len()];

        Ok(Self {
            beats_per_measure: beats_per_measure.max(1),
            settings: PlaybackSettings {
                tempo_percent: DEFAULT_TEMPO_PERCENT,
                loop_count: DEFAULT_LOOP_COUNT,
                section: None,
                mix: Mix::for_tracks(&voice_tracks),
            },
            voice_tracks,
            midi,
            transport: Transport::new(),
            voices,
            click: SynthVoice::new(CLICK_VOLUME_DB),
            parts: Vec::new(),
            scheduled: Vec::new(),
            auto_stop: None,
            plan: None,
            status: PlaybackStatus::Idle,
            current_loop: 0,
            disposed: false,
        })
    }

    /// Restrict guided presets to these tracks (the song's configured voices)
    pub fn with_voice_tracks(mut self, tracks: Vec<usize>) -> Self {
        self.voice_tracks = tracks;
        self
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// 1-based pass number, 0 before playback
    pub fn current_loop(&self) -> u32 {
        self.current_loop
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn transport(&self) -> &Transport<Cue> {
        &self.transport
    }

    /// Timeline of the current or most recent run
    pub fn plan(&self) -> Option<&LoopPlan> {
        self.plan.as_ref()
    }

    pub fn set_tempo(&mut self, percent: u32) -> Result<(), PlaybackError> {
        self.settings.tempo_percent = validate_tempo(percent)?;
        Ok(())
    }

    pub fn set_loop_count(&mut self, count: u32) -> Result<(), PlaybackError> {
        self.settings.loop_count = validate_loop_count(count)?;
        Ok(())
    }

    /// `None` plays the whole song
    pub fn select_section(&mut self, section: Option<SectionBounds>) {
        self.settings.section = section;
    }

    pub fn set_volume(&mut self, track: usize, db: f64) {
        self.settings.mix.set_volume(track, db);
    }

    pub fn set_enabled(&mut self, track: usize, enabled: bool) {
        self.settings.mix.set_enabled(track, enabled);
    }

    pub fn set_mix(&mut self, mix: Mix) {
        self.settings.mix = mix;
    }

    /// Replace the whole mix with a guided preset around `my_track`
    pub fn apply_guided_step(
        &mut self,
        step: GuidedStep,
        my_track: Option<usize>,
    ) -> Result<(), PlaybackError> {
        let my_track = my_track.ok_or(PlaybackError::NoVoiceSelected)?;
        self.settings.mix = Mix::guided(step, my_track, &self.voice_tracks);
        Ok(())
    }

    /// Work out the run's timeline without starting it
    pub fn preview(&self) -> Result<LoopPlan, PlaybackError> {
        let grid = self.grid();
        let (start, end) = self.section_window(&grid);
        if end <= start {
            return Err(PlaybackError::EmptySection);
        }
        Ok(plan_loops(&grid, end - start, self.settings.loop_count))
    }

    /// Start from the top, or resume when paused
    pub fn play(&mut self) -> Result<PlaybackStatus, PlaybackError> {
        if self.disposed {
            return Err(PlaybackError::Disposed);
        }
        match self.status {
            PlaybackStatus::Playing => return Ok(self.status),
            PlaybackStatus::Paused => {
                self.transport.start();
                self.status = PlaybackStatus::Playing;
                return Ok(self.status);
            }
            PlaybackStatus::Idle | PlaybackStatus::Finished => {}
        }

        self.teardown();
        let plan = self.preview()?;
        let grid = self.grid();
        let (section_start, section_end) = self.section_window(&grid);

        self.parts = self.build_parts(&grid, section_start, section_end);
        self.apply_gains();

        let spb = grid.seconds_per_beat();
        if plan.infinite {
            self.schedule_clicks(0.0, spb);
            let content_at = plan.count_in_seconds;
            self.schedule_cue(content_at, Cue::PassStart { number: 1 });
            self.schedule_parts(content_at);
            self.transport
                .set_loop(content_at, content_at + plan.content_seconds);
        } else {
            for iteration in &plan.iterations {
                if iteration.number > 1 {
                    self.parts = self.build_parts(&grid, section_start, section_end);
                }
                self.schedule_clicks(iteration.starts_at, spb);
                self.schedule_cue(iteration.content_at, Cue::PassStart { number: iteration.number });
                self.schedule_parts(iteration.content_at);
            }
            if let Some(at) = plan.auto_stop_at {
                self.auto_stop = Some(self.transport.schedule(at, Cue::AutoStop));
            }
        }

        log::info!(
            "Playback started: {} BPM, {} loop(s), section {:.2}s-{:.2}s",
            grid.bpm(),
            if plan.infinite { "endless".to_string() } else { plan.loop_count.to_string() },
            section_start,
            section_end
        );

        self.plan = Some(plan);
        self.transport.start();
        self.status = PlaybackStatus::Playing;
        self.current_loop = 1;
        Ok(self.status)
    }

    pub fn pause(&mut self) {
        if self.status == PlaybackStatus::Playing {
            self.transport.pause();
            self.status = PlaybackStatus::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.teardown();
        self.status = PlaybackStatus::Idle;
        self.current_loop = 0;
        log::debug!("Playback stopped");
    }

    /// Stop and release the synthesizers. A disposed session refuses to play.
    pub fn dispose(&mut self) {
        self.teardown();
        self.voices.clear();
        self.status = PlaybackStatus::Idle;
        self.current_loop = 0;
        self.disposed = true;
        log::debug!("Playback session disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Run the clock forward and play whatever came due
    pub fn advance(&mut self, dt: f64) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        if self.status != PlaybackStatus::Playing {
            return events;
        }
        let spb = self
            .plan
            .as_ref()
            .map_or_else(|| self.grid().seconds_per_beat(), |p| p.seconds_per_beat);

        for due in self.transport.advance(dt) {
            match due.event {
                Cue::Click { accent } => {
                    let pitch = if accent { CLICK_ACCENT_PITCH } else { CLICK_PITCH };
                    self.click.trigger_attack_release(pitch, spb / 8.0, due.at, 1.0);
                    events.push(PlaybackEvent::Click { at: due.at, accent });
                }
                Cue::Note { track, pitch, duration, velocity } => {
                    if let Some(voice) = self.voices.get_mut(track) {
                        voice.trigger_attack_release(pitch, duration, due.at, velocity);
                    }
                    events.push(PlaybackEvent::Note { at: due.at, track, pitch, duration });
                }
                Cue::PassStart { number } => {
                    self.current_loop = if self.plan.as_ref().is_some_and(|p| p.infinite) {
                        // Endless mode re-delivers pass 1; count the wraps instead
                        if due.at - due.time > 1e-6 { self.current_loop + 1 } else { 1 }
                    } else {
                        number
                    };
                    events.push(PlaybackEvent::Pass { at: due.at, number: self.current_loop });
                }
                Cue::AutoStop => {
                    log::info!("Playback finished after {} loop(s)", self.current_loop);
                    self.teardown();
                    self.status = PlaybackStatus::Finished;
                    events.push(PlaybackEvent::Finished { at: due.at });
                    break;
                }
            }
        }
        events
    }

    /// Advance by one block of samples and mix the synths into it
    pub fn render_block(&mut self, out: &mut [f32], sample_rate: u32) -> Vec<PlaybackEvent> {
        let start = self.transport.clock();
        let events = self.advance(out.len() as f64 / sample_rate as f64);
        for voice in &mut self.voices {
            voice.render(out, start, sample_rate);
        }
        self.click.render(out, start, sample_rate);
        events
    }

    fn grid(&self) -> TimeGrid {
        TimeGrid::new(
            self.midi.base_tempo_bpm,
            self.settings.tempo_percent,
            self.beats_per_measure,
        )
    }

    /// Section span in transport seconds, or the whole song
    fn section_window(&self, grid: &TimeGrid) -> (f64, f64) {
        match &self.settings.section {
            Some(bounds) => grid.section_span(bounds),
            None => (0.0, grid.scale(self.midi.duration_seconds)),
        }
    }

    fn build_parts(&self, grid: &TimeGrid, start: f64, end: f64) -> Vec<Part> {
        self.midi
            .tracks
            .iter()
            .enumerate()
            .map(|(track, t)| Part {
                track,
                notes: t
                    .notes
                    .iter()
                    .filter_map(|n| {
                        let onset = grid.scale(n.onset);
                        (onset >= start && onset < end).then(|| PartNote {
                            time: onset - start,
                            pitch: n.pitch,
                            duration: grid.scale(n.duration),
                            velocity: n.velocity,
                        })
                    })
                    .collect(),
            })
            .collect()
    }

    fn apply_gains(&mut self) {
        for (track, voice) in self.voices.iter_mut().enumerate() {
            voice.set_volume_db(self.settings.mix.gain_db(track));
        }
    }

    fn schedule_cue(&mut self, at: f64, cue: Cue) {
        let id = self.transport.schedule(at, cue);
        self.scheduled.push(id);
    }

    fn schedule_clicks(&mut self, offset: f64, seconds_per_beat: f64) {
        for beat in 0..self.beats_per_measure {
            let at = offset + beat as f64 * seconds_per_beat;
            self.schedule_cue(at, Cue::Click { accent: beat == 0 });
        }
    }

    fn schedule_parts(&mut self, offset: f64) {
        let cues: Vec<(f64, Cue)> = self
            .parts
            .iter()
            .flat_map(|part| {
                part.notes.iter().map(move |n| {
                    (
                        offset + n.time,
                        Cue::Note {
                            track: part.track,
                            pitch: n.pitch,
                            duration: n.duration,
                            velocity: n.velocity,
                        },
                    )
                })
            })
            .collect();
        for (at, cue) in cues {
            self.schedule_cue(at, cue);
        }
    }

    fn teardown(&mut self) {
        self.transport.stop();
        self.transport.cancel();
        self.transport.clear_loop();
        self.scheduled.clear();
        if let Some(id) = self.auto_stop.take() {
            self.transport.clear(id);
        }
        for voice in &mut self.voices {
            voice.release_all();
        }
        self.click.release_all();
        self.parts.clear();
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
