use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::buffer::AudioBuffer;
use crate::error::{RecorderError, Result};

pub trait SampleStore {
    fn write(&self, buffer: &AudioBuffer, path: &Path) -> Result<()>;
    fn read(&self, path: &Path) -> Result<AudioBuffer>;
    /// Removing a file that is already gone is not an error.
    fn delete(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// Mono 32-bit float WAV files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavStore;

impl SampleStore for WavStore {
    fn write(&self, buffer: &AudioBuffer, path: &Path) -> Result<()> {
        let write_err = |e: hound::Error| RecorderError::IoWriteError(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| RecorderError::IoWriteError(format!("{}: {}", parent.display(), e)))?;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(write_err)?;
        for &sample in buffer.samples() {
            writer.write_sample(sample).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)?;

        log::debug!("Wrote {} samples to {}", buffer.len(), path.display());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<AudioBuffer> {
        let read_err = |e: hound::Error| RecorderError::IoReadError(format!("{}: {}", path.display(), e));

        let mut reader = hound::WavReader::open(path).map_err(read_err)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_err)?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(read_err)?
            }
        };

        AudioBuffer::from_interleaved(&samples, spec.channels, spec.sample_rate)
            .map_err(|e| RecorderError::IoReadError(format!("{}: {}", path.display(), e)))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("Take already removed: {}", path.display());
                Ok(())
            }
            Err(e) => Err(RecorderError::IoWriteError(format!("{}: {}", path.display(), e))),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_preserves_float_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("C2_1.wav");
        let buffer = AudioBuffer::new(vec![0.0, 1.0, -0.5, 0.25], 48000).unwrap();

        WavStore.write(&buffer, &path).unwrap();
        assert!(WavStore.exists(&path));

        let loaded = WavStore.read(&path).unwrap();
        assert_eq!(loaded, buffer);
    }

    #[test]
    fn test_written_file_is_mono_float_at_buffer_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        let buffer = AudioBuffer::new(vec![0.5; 10], 22050).unwrap();
        WavStore.write(&buffer, &path).unwrap();

        let spec = hound::WavReader::open(&path).unwrap().spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
    }

    #[test]
    fn test_write_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("samples").join("A3_1.wav");
        WavStore.write(&AudioBuffer::silence(4, 44100).unwrap(), &path).unwrap();
        assert!(WavStore.exists(&path));
    }

    #[test]
    fn test_read_int_stereo_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [16384i16, 0, -16384, -16384] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = WavStore.read(&path).unwrap();
        assert_eq!(loaded.sample_rate(), 44100);
        assert_eq!(loaded.samples(), vec![0.25, -0.5]);
    }

    #[test]
    fn test_read_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = WavStore.read(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(RecorderError::IoReadError(_))));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.wav");
        WavStore.write(&AudioBuffer::silence(4, 44100).unwrap(), &path).unwrap();

        WavStore.delete(&path).unwrap();
        assert!(!WavStore.exists(&path));
        WavStore.delete(&path).unwrap();
    }

    #[test]
    fn test_write_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let result = WavStore.write(&AudioBuffer::silence(4, 44100).unwrap(), &blocker.join("take.wav"));
        assert!(matches!(result, Err(RecorderError::IoWriteError(_))));
    }
}
