use std::io::BufReader;
use std::path::Path;

use hound::SampleFormat;

use crate::error::{NomadError, Result};

/// Mono samples and the rate they were recorded at.
#[derive(Debug)]
pub(crate) struct DecodedWav {
    pub(crate) mono: Vec<f32>,
    pub(crate) sample_rate: u32,
}

/// Decode a WAV file, scaling integer PCM to `[-1, 1)` and averaging channels.
pub(crate) fn decode_wav(path: &Path) -> Result<DecodedWav> {
    let file = std::fs::File::open(path).map_err(|err| NomadError::io(path, err))?;
    let mut reader = hound::WavReader::new(BufReader::new(file))
        .map_err(|err| audio_error(path, format!("invalid wav: {err}")))?;
    let spec = reader.spec();
    let interleaved = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| audio_error(path, format!("sample error: {err}")))?,
        SampleFormat::Int => {
            let scale = (1i64 << spec.bits_per_sample.saturating_sub(1)).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|err| audio_error(path, format!("sample error: {err}")))?
        }
    };
    Ok(DecodedWav {
        mono: downmix(&interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn audio_error(path: &Path, detail: String) -> NomadError {
    NomadError::Audio {
        path: path.to_path_buf(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stereo_int_pcm_is_scaled_and_averaged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for (left, right) in [(16_384i16, 0i16), (-16_384, -16_384), (8_192, 8_192)] {
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.mono, vec![0.25, -0.5, 0.25]);
    }

    #[test]
    fn garbage_file_is_an_audio_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"RIFF????WAVEjunk").unwrap();
        assert!(matches!(
            decode_wav(&path).unwrap_err(),
            NomadError::Audio { .. }
        ));
    }
}
