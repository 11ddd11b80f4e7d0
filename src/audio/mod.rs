//! WAV loading for the command-line paths.
//!
//! The scoring API itself takes plain 16 kHz mono waveforms; this module turns
//! a file or a directory of `.wav` files into named waveforms of that form.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{NomadError, Result};

mod decode;
mod resample;

/// Rate every waveform is resampled to before embedding.
pub const SAMPLE_RATE: u32 = 16_000;

/// A decoded waveform with the file name it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioItem {
    pub name: String,
    pub samples: Vec<f32>,
}

impl AsRef<[f32]> for AudioItem {
    fn as_ref(&self) -> &[f32] {
        &self.samples
    }
}

/// Load a single `.wav` file, or every `.wav` directly inside a directory.
///
/// Directory entries are sorted by file name; subdirectories are not
/// searched. `trim_seconds` truncates each waveform after resampling.
pub fn load_audio_items(path: &Path, trim_seconds: Option<f32>) -> Result<Vec<AudioItem>> {
    let files = if path.is_dir() {
        list_wav_files(path)?
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        return Err(NomadError::invalid(format!(
            "audio path {} does not exist",
            path.display()
        )));
    };
    if files.is_empty() {
        warn!("No .wav files found in {}", path.display());
    }
    files
        .iter()
        .map(|file| load_wav(file, trim_seconds))
        .collect()
}

/// Sorted `.wav` files directly inside `dir`.
pub fn list_wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|err| NomadError::io(dir, err))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_wav(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Decode one file into a 16 kHz mono waveform.
pub fn load_wav(path: &Path, trim_seconds: Option<f32>) -> Result<AudioItem> {
    let decoded = decode::decode_wav(path)?;
    let mut samples = resample::resample_linear(&decoded.mono, decoded.sample_rate, SAMPLE_RATE);
    if let Some(seconds) = trim_seconds.filter(|s| s.is_finite() && *s > 0.0) {
        samples.truncate((seconds * SAMPLE_RATE as f32).round() as usize);
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!(
        "Loaded {name}: {} Hz, {} samples at {SAMPLE_RATE} Hz",
        decoded.sample_rate,
        samples.len()
    );
    Ok(AudioItem { name, samples })
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn directory_is_listed_sorted_and_flat() {
        let dir = tempdir().unwrap();
        write_wav(&dir.path().join("b.wav"), 16_000, &[0.1; 400]);
        write_wav(&dir.path().join("a.WAV"), 16_000, &[0.2; 400]);
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write_wav(&dir.path().join("nested").join("c.wav"), 16_000, &[0.3; 400]);

        let items = load_audio_items(dir.path(), None).unwrap();
        let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["a.WAV", "b.wav"]);
        assert_eq!(items[0].samples.len(), 400);
    }

    #[test]
    fn single_file_is_resampled_and_trimmed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, 8_000, &vec![0.5; 8_000 * 3]);

        let full = load_audio_items(&path, None).unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].samples.len(), 48_000);

        let trimmed = load_wav(&path, Some(1.5)).unwrap();
        assert_eq!(trimmed.samples.len(), 24_000);
        assert_eq!(trimmed.name, "long.wav");
    }

    #[test]
    fn missing_path_is_invalid() {
        let dir = tempdir().unwrap();
        let err = load_audio_items(&dir.path().join("absent"), None).unwrap_err();
        assert!(matches!(err, NomadError::InvalidArgument(_)));
    }

    #[test]
    fn empty_directory_yields_no_items() {
        let dir = tempdir().unwrap();
        assert!(load_audio_items(dir.path(), None).unwrap().is_empty());
    }
}
