// Offline render of a finite practice run to WAV

use super::session::{PlaybackSession, PlaybackStatus};
use super::PlaybackError;
use std::io::{Cursor, Seek, Write};

const BLOCK_FRAMES: usize = 512;

/// Refuse runs that are endless or longer than `max_seconds`
pub fn check_render_length(
    session: &PlaybackSession,
    max_seconds: f64,
) -> Result<f64, PlaybackError> {
    if session.settings().loop_count == 0 {
        return Err(PlaybackError::InfiniteRender);
    }
    let total = session
        .preview()?
        .total_seconds
        .ok_or(PlaybackError::InfiniteRender)?;
    if total > max_seconds {
        return Err(PlaybackError::RenderTooLong { seconds: total, max: max_seconds });
    }
    Ok(total)
}

/// Play the session to its auto-stop on the virtual clock and return mono samples
pub fn render_session(
    session: &mut PlaybackSession,
    sample_rate: u32,
    max_seconds: f64,
) -> Result<Vec<f32>, PlaybackError> {
    let total = check_render_length(session, max_seconds)?;
    session.stop();
    session.play()?;
    let total_frames = (total * sample_rate as f64).ceil() as usize;

    let mut samples = Vec::with_capacity(total_frames + BLOCK_FRAMES);
    while session.status() == PlaybackStatus::Playing && samples.len() < total_frames + BLOCK_FRAMES {
        let mut block = [0.0f32; BLOCK_FRAMES];
        session.render_block(&mut block, sample_rate);
        samples.extend_from_slice(&block);
    }
    samples.truncate(total_frames);

    log::info!(
        "Rendered {:.1}s of practice audio at {} Hz",
        total,
        sample_rate
    );
    Ok(samples)
}

/// Write 16-bit mono PCM
pub fn write_wav<W: Write + Seek>(samples: &[f32], sample_rate: u32, writer: W) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav = hound::WavWriter::new(writer, spec)?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        wav.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    wav.finalize()?;
    Ok(())
}

/// Render the session straight to WAV bytes
pub fn render_wav(
    session: &mut PlaybackSession,
    sample_rate: u32,
    max_seconds: f64,
) -> anyhow::Result<Vec<u8>> {
    let samples = render_session(session, sample_rate, max_seconds)?;
    let mut cursor = Cursor::new(Vec::new());
    write_wav(&samples, sample_rate, &mut cursor)?;
    Ok(cursor.into_inner())
}
