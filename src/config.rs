use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::PREFERRED_SAMPLE_RATE;
use crate::error::{RecorderError, Result};
use crate::pitch::{Note, Tuning, parse_note};
use crate::synth::GUIDE_DURATION_SECS;
use crate::waveform::WaveformType;

pub const DEFAULT_OUTPUT_DIR: &str = "choir_samples";

/// Everything a session needs to know before the first note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tuning_hz: f64,
    pub sample_length_secs: f64,
    pub countdown_secs: u32,
    pub start_note: String,
    pub waveform: WaveformType,
    pub sample_rate_hz: u32,
    // None selects the host's default device
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub output_dir: PathBuf,
    pub guide_duration_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            tuning_hz: Tuning::STANDARD.hz(),
            sample_length_secs: 2.5,
            countdown_secs: 3,
            start_note: "C2".to_string(),
            waveform: WaveformType::Triangle,
            sample_rate_hz: PREFERRED_SAMPLE_RATE,
            input_device: None,
            output_device: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            guide_duration_secs: GUIDE_DURATION_SECS,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| RecorderError::IoReadError(format!("{}: {}", path.display(), e)))?;
        let config: SessionConfig = serde_json::from_str(&data)
            .map_err(|e| RecorderError::IoReadError(format!("{}: {}", path.display(), e)))?;
        log::debug!("Loaded session config from {}", path.display());
        Ok(config)
    }

    /// Save as pretty JSON, creating parent directories if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |e: std::io::Error| RecorderError::IoWriteError(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RecorderError::IoWriteError(format!("{}: {}", path.display(), e)))?;
        fs::write(path, json).map_err(write_err)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.tuning()?;
        positive("sample length", self.sample_length_secs)?;
        positive("guide duration", self.guide_duration_secs)?;
        if self.sample_rate_hz == 0 {
            return Err(RecorderError::InvalidParameter("sample rate must be positive".to_string()));
        }
        if self.countdown_secs < 1 {
            return Err(RecorderError::InvalidParameter("countdown must be at least 1 second".to_string()));
        }
        self.start_note()?;
        Ok(())
    }

    pub fn tuning(&self) -> Result<Tuning> {
        Tuning::new(self.tuning_hz)
    }

    pub fn start_note(&self) -> Result<Note> {
        parse_note(&self.start_note)
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RecorderError::InvalidParameter(format!("{} must be positive, got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.tuning_hz, 440.0);
        assert_eq!(config.sample_length_secs, 2.5);
        assert_eq!(config.countdown_secs, 3);
        assert_eq!(config.start_note, "C2");
        assert_eq!(config.waveform, WaveformType::Triangle);
        assert_eq!(config.sample_rate_hz, 48000);
        assert_eq!(config.output_dir, PathBuf::from("choir_samples"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings").join("session.json");
        let config = SessionConfig {
            tuning_hz: 442.0,
            start_note: "F#3".to_string(),
            waveform: WaveformType::Square,
            input_device: Some("USB Mic".to_string()),
            ..SessionConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "tuning_hz": 415.0, "waveform": "sine" }"#).unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.tuning_hz, 415.0);
        assert_eq!(config.waveform, WaveformType::Sine);
        assert_eq!(config.countdown_secs, 3);
        assert_eq!(config.start_note, "C2");
    }

    #[test]
    fn test_load_errors_are_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SessionConfig::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(RecorderError::IoReadError(_))));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SessionConfig::load(&path), Err(RecorderError::IoReadError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            SessionConfig { tuning_hz: 0.0, ..Default::default() },
            SessionConfig { sample_length_secs: -1.0, ..Default::default() },
            SessionConfig { guide_duration_secs: f64::INFINITY, ..Default::default() },
            SessionConfig { sample_rate_hz: 0, ..Default::default() },
            SessionConfig { countdown_secs: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(RecorderError::InvalidParameter(_))));
        }

        let config = SessionConfig { start_note: "H2".to_string(), ..Default::default() };
        assert!(matches!(config.validate(), Err(RecorderError::InvalidNoteFormat(_))));
    }
}
