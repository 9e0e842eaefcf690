// Measure/beat positions, tempo scaling and loop layout

use crate::song::PracticeSection;
use serde::{Deserialize, Serialize};

/// Section bounds as 1-based measure/beat pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBounds {
    pub start_measure: u32,
    pub start_beat: u32,
    pub end_measure: u32,
    pub end_beat: u32,
}

impl From<&PracticeSection> for SectionBounds {
    fn from(section: &PracticeSection) -> Self {
        Self {
            start_measure: section.start_measure,
            start_beat: section.start_beat,
            end_measure: section.end_measure,
            end_beat: section.end_beat,
        }
    }
}

/// Converts musical positions to transport seconds at a given playback tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    pub base_tempo_bpm: f64,
    pub tempo_percent: u32,
    pub beats_per_measure: u32,
}

impl TimeGrid {
    pub fn new(base_tempo_bpm: f64, tempo_percent: u32, beats_per_measure: u32) -> Self {
        Self {
            base_tempo_bpm,
            tempo_percent,
            beats_per_measure: beats_per_measure.max(1),
        }
    }

    pub fn bpm(&self) -> f64 {
        self.base_tempo_bpm * self.tempo_percent as f64 / 100.0
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm()
    }

    /// Start time of a 1-based measure/beat
    pub fn position_seconds(&self, measure: u32, beat: u32) -> f64 {
        let total_beats = measure.saturating_sub(1) as u64 * self.beats_per_measure as u64
            + beat.saturating_sub(1) as u64;
        total_beats as f64 * self.seconds_per_beat()
    }

    pub fn section_span(&self, bounds: &SectionBounds) -> (f64, f64) {
        (
            self.position_seconds(bounds.start_measure, bounds.start_beat),
            self.position_seconds(bounds.end_measure, bounds.end_beat),
        )
    }

    /// One measure of clicks before each pass
    pub fn count_in_seconds(&self) -> f64 {
        self.seconds_per_beat() * self.beats_per_measure as f64
    }

    /// Silent measure after each finite pass
    pub fn break_seconds(&self) -> f64 {
        self.count_in_seconds()
    }

    /// MIDI-file seconds to transport seconds
    pub fn scale(&self, midi_seconds: f64) -> f64 {
        midi_seconds * 100.0 / self.tempo_percent as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopIteration {
    pub number: u32,
    /// First count-in click
    pub starts_at: f64,
    /// First note of the pass
    pub content_at: f64,
    pub content_end: f64,
    /// End of the trailing silent measure
    pub ends_at: f64,
}

/// Timeline of a playback run. Endless runs list only the first pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopPlan {
    pub tempo_bpm: f64,
    pub seconds_per_beat: f64,
    pub count_in_seconds: f64,
    pub content_seconds: f64,
    pub break_seconds: f64,
    pub loop_count: u32,
    pub infinite: bool,
    pub iterations: Vec<LoopIteration>,
    pub total_seconds: Option<f64>,
    pub auto_stop_at: Option<f64>,
}

pub fn plan_loops(grid: &TimeGrid, content_seconds: f64, loop_count: u32) -> LoopPlan {
    let count_in = grid.count_in_seconds();
    let brk = grid.break_seconds();
    let infinite = loop_count == 0;

    let mut iterations = Vec::new();
    if infinite {
        iterations.push(LoopIteration {
            number: 1,
            starts_at: 0.0,
            content_at: count_in,
            content_end: count_in + content_seconds,
            ends_at: count_in + content_seconds,
        });
    } else {
        let mut offset = 0.0;
        for number in 1..=loop_count {
            let content_at = offset + count_in;
            let content_end = content_at + content_seconds;
            let ends_at = content_end + brk;
            iterations.push(LoopIteration {
                number,
                starts_at: offset,
                content_at,
                content_end,
                ends_at,
            });
            offset = ends_at;
        }
    }

    let total_seconds = if infinite {
        None
    } else {
        iterations.last().map(|it| it.ends_at)
    };

    LoopPlan {
        tempo_bpm: grid.bpm(),
        seconds_per_beat: grid.seconds_per_beat(),
        count_in_seconds: count_in,
        content_seconds,
        break_seconds: if infinite { 0.0 } else { brk },
        loop_count,
        infinite,
        iterations,
        total_seconds,
        auto_stop_at: total_seconds,
    }
}
