use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RecorderError, Result};
use crate::pitch::Note;

pub const DESCRIPTOR_EXTENSION: &str = ".sfz";
pub const DEFAULT_DESCRIPTOR_NAME: &str = "choir";

/// Pan positions handed out to successive takes of one note.
pub const PAN_CYCLE: [i32; 4] = [-30, -15, 15, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    #[default]
    NoLoop,
    OneShot,
    LoopContinuous,
    LoopSustain,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::NoLoop => "no_loop",
            LoopMode::OneShot => "one_shot",
            LoopMode::LoopContinuous => "loop_continuous",
            LoopMode::LoopSustain => "loop_sustain",
        }
    }

    /// Only the looping modes carry loop points.
    pub fn has_loop_points(&self) -> bool {
        matches!(self, LoopMode::LoopContinuous | LoopMode::LoopSustain)
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoopMode {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "no_loop" => Ok(LoopMode::NoLoop),
            "one_shot" => Ok(LoopMode::OneShot),
            "loop_continuous" => Ok(LoopMode::LoopContinuous),
            "loop_sustain" => Ok(LoopMode::LoopSustain),
            other => Err(RecorderError::InvalidParameter(format!("unknown loop mode '{}'", other))),
        }
    }
}

/// Amplitude envelope and loop settings written to the group header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeParams {
    pub attack_secs: f64,
    pub release_secs: f64,
    pub sustain_percent: f64,
    pub velocity_track_percent: f64,
    pub loop_mode: LoopMode,
    // Sample-frame offsets, only written for looping modes
    pub loop_start: u64,
    pub loop_end: u64,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        EnvelopeParams {
            attack_secs: 0.0,
            release_secs: 0.01,
            sustain_percent: 100.0,
            velocity_track_percent: 100.0,
            loop_mode: LoopMode::NoLoop,
            loop_start: 0,
            loop_end: 0,
        }
    }
}

impl EnvelopeParams {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [("attack", self.attack_secs), ("release", self.release_secs)];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(RecorderError::InvalidParameter(format!(
                    "{} time must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }

        let percentages = [
            ("sustain", self.sustain_percent),
            ("velocity track", self.velocity_track_percent),
        ];
        for (name, value) in percentages {
            if !(0.0..=100.0).contains(&value) {
                return Err(RecorderError::InvalidParameter(format!(
                    "{} must be between 0 and 100 percent, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// Kept takes per note. Notes iterate in the order they were first
/// recorded and takes in the order they were kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleLedger {
    entries: Vec<(Note, Vec<PathBuf>)>,
}

impl SampleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, note: Note, take: impl Into<PathBuf>) {
        let take = take.into();
        match self.entries.iter_mut().find(|(n, _)| *n == note) {
            Some((_, takes)) => takes.push(take),
            None => self.entries.push((note, vec![take])),
        }
    }

    pub fn takes(&self, note: Note) -> &[PathBuf] {
        self.entries
            .iter()
            .find(|(n, _)| *n == note)
            .map(|(_, takes)| takes.as_slice())
            .unwrap_or(&[])
    }

    pub fn take_count(&self, note: Note) -> usize {
        self.takes(note).len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Note, &[PathBuf])> {
        self.entries.iter().map(|(note, takes)| (*note, takes.as_slice()))
    }

    /// Number of notes with at least one kept take.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_takes(&self) -> usize {
        self.entries.iter().map(|(_, takes)| takes.len()).sum()
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Render the SFZ text for `ledger`.
pub fn render(ledger: &SampleLedger, params: &EnvelopeParams) -> Result<String> {
    params.validate()?;

    let mut out = String::new();
    write_group(&mut out, params)
        .and_then(|()| write_regions(&mut out, ledger))
        .map_err(|e| RecorderError::IoWriteError(format!("failed to format region map: {}", e)))?;
    Ok(out)
}

fn write_group(out: &mut String, params: &EnvelopeParams) -> fmt::Result {
    writeln!(out, "<group>")?;
    writeln!(out, " ampeg_attack={:.3}", params.attack_secs)?;
    writeln!(out, " ampeg_release={:.3}", params.release_secs)?;
    writeln!(out, " ampeg_sustain={:.1}", params.sustain_percent)?;
    writeln!(out, " amp_veltrack={:.1}", params.velocity_track_percent)?;
    writeln!(out, " loop_mode={}", params.loop_mode)?;
    if params.loop_mode.has_loop_points() {
        writeln!(out, " loop_start={}", params.loop_start)?;
        writeln!(out, " loop_end={}", params.loop_end)?;
    }
    writeln!(out)
}

// One region per take, pans cycling per note, a blank line after each note
fn write_regions(out: &mut String, ledger: &SampleLedger) -> fmt::Result {
    for (note, takes) in ledger.iter() {
        let key = note.descriptor_key();
        for (i, take) in takes.iter().enumerate() {
            let pan = PAN_CYCLE[i % PAN_CYCLE.len()];
            writeln!(out, "<region> sample={} key={} pan={}", base_name(take), key, pan)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write the SFZ descriptor for `ledger` to `output_path`.
///
/// Regions reference samples by bare file name, which players resolve
/// against the descriptor's own directory, so the descriptor belongs in
/// `sample_dir`. A failed write removes whatever partial file it left.
pub fn generate(
    ledger: &SampleLedger,
    output_path: &Path,
    sample_dir: &Path,
    params: &EnvelopeParams,
) -> Result<()> {
    let content = render(ledger, params)?;

    let descriptor_dir = output_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    if descriptor_dir != sample_dir {
        log::warn!(
            "Descriptor {} is not in sample directory {}; sample references may not resolve",
            output_path.display(),
            sample_dir.display()
        );
    }

    if let Err(e) = fs::write(output_path, content) {
        if output_path.is_file() {
            if let Err(cleanup) = fs::remove_file(output_path) {
                log::warn!("Could not remove partial {}: {}", output_path.display(), cleanup);
            }
        }
        return Err(RecorderError::IoWriteError(format!("{}: {}", output_path.display(), e)));
    }

    log::info!(
        "Wrote {} regions for {} notes to {}",
        ledger.total_takes(),
        ledger.len(),
        output_path.display()
    );
    Ok(())
}

/// Normalize a user-supplied descriptor name, appending `.sfz` when missing.
pub fn descriptor_file_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RecorderError::InvalidParameter("descriptor file name is empty".to_string()));
    }
    if name.ends_with(DESCRIPTOR_EXTENSION) {
        Ok(name.to_string())
    } else {
        Ok(format!("{}{}", name, DESCRIPTOR_EXTENSION))
    }
}
