//! WAV file export

use super::{render_blocks, ExportSummary};
use crate::backend::ChipBackend;
use crate::config::ExportConfig;
use crate::{ChipError, Result};
use std::path::Path;
use tracing::info;

/// Render the song from row 0 into a 16-bit stereo WAV file.
///
/// Samples are streamed to disk block by block.
///
/// ```no_run
/// use chiptrack::backend::create_backend;
/// use chiptrack::config::EngineConfig;
/// use chiptrack::export::render_song_to_wav;
///
/// # fn main() -> chiptrack::Result<()> {
/// let config = EngineConfig::default();
/// let mut backend = create_backend("bv", &config)?;
/// backend.load_song("tune.bv".as_ref())?;
/// render_song_to_wav(backend.as_mut(), "tune.wav", &config.export)?;
/// # Ok(())
/// # }
/// ```
pub fn render_song_to_wav<P: AsRef<Path>>(
    backend: &mut dyn ChipBackend,
    output_path: P,
    config: &ExportConfig,
) -> Result<ExportSummary> {
    let path = output_path.as_ref();
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: backend.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| ChipError::AudioFile(format!("failed to create {}: {e}", path.display())))?;

    let summary = render_blocks(backend, config, |block| {
        for frame in block {
            writer
                .write_sample(frame.left)
                .and_then(|()| writer.write_sample(frame.right))
                .map_err(|e| ChipError::AudioFile(format!("failed to write sample: {e}")))?;
        }
        Ok(())
    })?;

    writer
        .finalize()
        .map_err(|e| ChipError::AudioFile(format!("failed to finalize {}: {e}", path.display())))?;

    info!(path = %path.display(), frames = summary.frames, seconds = summary.seconds, "wav written");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::create_backend;
    use crate::config::EngineConfig;

    #[test]
    fn test_wav_header_matches_render() {
        let config = EngineConfig::default();
        let mut backend = create_backend("p1xl", &config).expect("backend");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.wav");

        let summary =
            render_song_to_wav(backend.as_mut(), &path, &ExportConfig { max_seconds: 1 }).expect("render");

        let reader = hound::WavReader::open(&path).expect("readable wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(u64::from(reader.duration()), summary.frames);
    }

    #[test]
    fn test_unwritable_path_is_audio_error() {
        let config = EngineConfig::default();
        let mut backend = create_backend("lft", &config).expect("backend");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.wav");
        let err = render_song_to_wav(backend.as_mut(), &path, &config.export).expect_err("no parent dir");
        assert!(matches!(err, ChipError::AudioFile(_)));
    }
}
