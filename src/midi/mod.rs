// MIDI import: full decode for playback, track metadata for voice setup

pub mod parser;
pub mod tracks;

pub use parser::*;
pub use tracks::*;

#[cfg(test)]
pub(crate) mod testing;
