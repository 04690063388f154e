//! Offline rendering
//!
//! - [`wav`]: render a song to a 16-bit stereo WAV file
//! - [`trace`]: step a backend tick by tick and dump channel state as CSV
//!
//! Both drive a backend from song row 0. Rendering stops when the song ends,
//! when a looping song wraps for the first time, or at
//! [`ExportConfig::max_seconds`].

pub mod trace;
pub mod wav;

pub use trace::write_trace_csv;
pub use wav::render_song_to_wav;

use crate::backend::{ChipBackend, StereoFrame};
use crate::config::ExportConfig;
use crate::Result;
use tracing::{debug, warn};

/// Frames rendered per `get_samples` call
pub const BLOCK_FRAMES: usize = 1024;

/// Outcome of a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSummary {
    /// Frames produced
    pub frames: u64,
    /// Duration in seconds
    pub seconds: f64,
    /// Whether rendering stopped at the time limit
    pub truncated: bool,
}

/// Play the song from the top and hand every rendered block to `sink`.
pub fn render_blocks<F>(
    backend: &mut dyn ChipBackend,
    config: &ExportConfig,
    mut sink: F,
) -> Result<ExportSummary>
where
    F: FnMut(&[StereoFrame]) -> Result<()>,
{
    let sample_rate = backend.sample_rate().max(1);
    let limit = u64::from(config.max_seconds) * u64::from(sample_rate);
    let mut buffer = vec![StereoFrame::default(); BLOCK_FRAMES];
    let mut frames = 0u64;

    backend.stop();
    backend.play_song_from(0, 0);
    while frames < limit && backend.is_playing() && backend.loop_count() == 0 {
        let len = (limit - frames).min(BLOCK_FRAMES as u64) as usize;
        backend.get_samples(&mut buffer[..len]);
        sink(&buffer[..len])?;
        frames += len as u64;
    }
    let truncated = frames >= limit;
    backend.stop();

    if truncated {
        warn!(max_seconds = config.max_seconds, backend = backend.id(), "render stopped at the time limit");
    }
    let summary = ExportSummary {
        frames,
        seconds: frames as f64 / f64::from(sample_rate),
        truncated,
    };
    debug!(frames, seconds = summary.seconds, "render finished");
    Ok(summary)
}

/// Render the song into memory.
pub fn render_song(backend: &mut dyn ChipBackend, config: &ExportConfig) -> Result<Vec<StereoFrame>> {
    let mut frames = Vec::new();
    render_blocks(backend, config, |block| {
        frames.extend_from_slice(block);
        Ok(())
    })?;
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::create_backend;
    use crate::config::EngineConfig;

    #[test]
    fn test_time_limit_bounds_render() {
        let config = EngineConfig::default();
        let mut backend = create_backend("lft", &config).expect("backend");
        let export = ExportConfig { max_seconds: 1 };
        let mut blocks = 0;
        let summary = render_blocks(backend.as_mut(), &export, |block| {
            assert!(block.len() <= BLOCK_FRAMES);
            blocks += 1;
            Ok(())
        })
        .expect("render");
        assert!(summary.frames <= 44_100);
        assert!(blocks > 0);
        assert!(!backend.is_playing(), "playback is stopped afterwards");
    }

    #[test]
    fn test_finished_register_song_stops_early() {
        let config = EngineConfig::default();
        let mut backend = create_backend("bv", &config).expect("backend");
        for channel in 0..3 {
            backend.set_song_cell(1, channel, 4, 3);
        }
        let frames = render_song(backend.as_mut(), &ExportConfig { max_seconds: 60 }).expect("render");
        // 16 lines of 20 ticks at 50 Hz
        let expected = 44_100 * 16 * 20 / 50;
        assert!(frames.len() + 2 * 882 >= expected, "{} frames", frames.len());
        assert!(frames.len() < expected + 2 * BLOCK_FRAMES, "{} frames", frames.len());
    }
}
