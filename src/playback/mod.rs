// Practice playback: time math, transport clock, voice mixing and offline render

pub mod timing;
pub mod transport;
pub mod mix;
pub mod synth;
pub mod session;
pub mod render;

pub use timing::*;
pub use transport::{EventId, Transport, TransportState};
pub use mix::*;
pub use session::*;
pub use render::*;

pub const MIN_TEMPO_PERCENT: u32 = 50;
pub const MAX_TEMPO_PERCENT: u32 = 150;
pub const DEFAULT_TEMPO_PERCENT: u32 = 100;

/// 0 loops forever
pub const MAX_LOOP_COUNT: u32 = 10;
pub const DEFAULT_LOOP_COUNT: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("No MIDI file available for playback")]
    NotAvailable,

    #[error("Failed to load MIDI: {0}")]
    Midi(String),

    #[error("Tempo must be between 50% and 150%, got {0}%")]
    InvalidTempo(u32),

    #[error("Loop count must be between 0 and 10, got {0}")]
    InvalidLoopCount(u32),

    #[error("Guided step must be 1, 2 or 3, got {0}")]
    InvalidGuidedStep(u8),

    #[error("Guided practice needs a selected voice")]
    NoVoiceSelected,

    #[error("Section ends before it starts")]
    EmptySection,

    #[error("Endless looping cannot be rendered")]
    InfiniteRender,

    #[error("Render of {seconds:.0}s exceeds the {max:.0}s limit")]
    RenderTooLong { seconds: f64, max: f64 },

    #[error("Playback session was disposed")]
    Disposed,
}

pub fn validate_tempo(percent: u32) -> Result<u32, PlaybackError> {
    if (MIN_TEMPO_PERCENT..=MAX_TEMPO_PERCENT).contains(&percent) {
        Ok(percent)
    } else {
        Err(PlaybackError::InvalidTempo(percent))
    }
}

pub fn validate_loop_count(count: u32) -> Result<u32, PlaybackError> {
    if count <= MAX_LOOP_COUNT {
        Ok(count)
    } else {
        Err(PlaybackError::InvalidLoopCount(count))
    }
}
