use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{SILENCE_THRESHOLD, capture_take};
use crate::config::SessionConfig;
use crate::device::{CaptureDevice, PlaybackDevice};
use crate::error::{RecorderError, Result};
use crate::pitch::{Note, Tuning, note_sequence};
use crate::region_map::{self, EnvelopeParams, SampleLedger};
use crate::store::SampleStore;
use crate::synth::guide_tone;

pub const FIRST_OCTAVE: u8 = 2;
pub const LAST_OCTAVE: u8 = 10;

/// Pause between countdown numbers.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Pause between "go" and the start of capture.
pub const GO_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Count(u32),
    Go,
}

/// Counts down from `secs` to 1, then yields `Go` once finished.
/// The caller waits [`TICK_INTERVAL`] between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    finished: bool,
}

impl Countdown {
    pub fn new(secs: u32) -> Self {
        Countdown { remaining: secs, finished: false }
    }

    pub fn tick(&mut self) -> CountdownTick {
        if self.remaining > 0 {
            let n = self.remaining;
            self.remaining -= 1;
            CountdownTick::Count(n)
        } else {
            self.finished = true;
            CountdownTick::Go
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    AwaitingConfig,
    PlayingGuide { note: Note },
    AwaitingCapture { note: Note, countdown: Countdown },
    Reviewing { note: Note, take_path: PathBuf },
    Finishing,
    Done,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingConfig => "awaiting config",
            SessionState::PlayingGuide { .. } => "playing guide",
            SessionState::AwaitingCapture { .. } => "awaiting capture",
            SessionState::Reviewing { .. } => "reviewing",
            SessionState::Finishing => "finishing",
            SessionState::Done => "done",
        }
    }

    /// Note currently being recorded, if any.
    pub fn note(&self) -> Option<Note> {
        match self {
            SessionState::PlayingGuide { note }
            | SessionState::AwaitingCapture { note, .. }
            | SessionState::Reviewing { note, .. } => Some(*note),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.note() {
            Some(note) => write!(f, "{} ({})", self.name(), note),
            None => f.write_str(self.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep the take and move to the next note.
    Keep,
    /// Keep the take and record another one for the same note.
    KeepAgain,
    /// Delete the take and record the same note again.
    Discard,
    /// Move to the next note without keeping anything.
    Skip,
}

/// Drives one recording session note by note.
///
/// Every kept take in the ledger has been written through the store and
/// was still present when it was kept. Takes that are discarded, skipped
/// or abandoned by an early finish are deleted.
pub struct Session<P: PlaybackDevice, C: CaptureDevice, S: SampleStore> {
    playback: P,
    capture: C,
    store: S,
    config: SessionConfig,
    tuning: Tuning,
    notes: Vec<Note>,
    index: usize,
    state: SessionState,
    ledger: SampleLedger,
    descriptor_path: Option<PathBuf>,
}

impl<P: PlaybackDevice, C: CaptureDevice, S: SampleStore> Session<P, C, S> {
    pub fn new(playback: P, capture: C, store: S) -> Self {
        Session {
            playback,
            capture,
            store,
            config: SessionConfig::default(),
            tuning: Tuning::STANDARD,
            notes: note_sequence(FIRST_OCTAVE, LAST_OCTAVE),
            index: 0,
            state: SessionState::AwaitingConfig,
            ledger: SampleLedger::new(),
            descriptor_path: None,
        }
    }

    /// Validate `config`, create the output directory and queue the start note.
    pub fn start(&mut self, config: SessionConfig) -> Result<()> {
        if self.state != SessionState::AwaitingConfig {
            return Err(self.invalid("start"));
        }
        config.validate()?;
        let tuning = config.tuning()?;
        let start = config.start_note()?;

        fs::create_dir_all(&config.output_dir)
            .map_err(|e| RecorderError::IoWriteError(format!("{}: {}", config.output_dir.display(), e)))?;

        self.index = self.notes.iter().position(|n| *n == start).unwrap_or(0);
        self.tuning = tuning;
        self.config = config;

        log::info!(
            "Session started at {} ({} notes, A4 = {} Hz, {} Hz, {})",
            self.notes[self.index],
            self.notes.len() - self.index,
            self.tuning.hz(),
            self.config.sample_rate_hz,
            self.config.waveform
        );
        self.state = SessionState::PlayingGuide { note: self.notes[self.index] };
        Ok(())
    }

    /// Play the guide tone for the current note and arm the countdown.
    pub fn play_guide(&mut self) -> Result<()> {
        let note = match &self.state {
            SessionState::PlayingGuide { note } => *note,
            _ => return Err(self.invalid("play the guide tone")),
        };

        self.play_guide_tone(note)?;
        self.state = SessionState::AwaitingCapture { note, countdown: self.new_countdown() };
        Ok(())
    }

    pub fn tick_countdown(&mut self) -> Result<CountdownTick> {
        if let SessionState::AwaitingCapture { countdown, .. } = &mut self.state {
            return Ok(countdown.tick());
        }
        Err(self.invalid("tick the countdown"))
    }

    /// Record, post-process and store one take of the current note.
    ///
    /// Only allowed once the countdown has reached `Go`. On failure the
    /// countdown is re-armed so the caller can try again.
    pub fn capture(&mut self) -> Result<PathBuf> {
        let note = match &self.state {
            SessionState::AwaitingCapture { note, countdown } if countdown.is_finished() => *note,
            SessionState::AwaitingCapture { .. } => {
                return Err(RecorderError::InvalidState("countdown has not finished".to_string()));
            }
            _ => return Err(self.invalid("capture")),
        };

        match self.record_take(note) {
            Ok(take_path) => {
                log::info!("Recorded {}", take_path.display());
                self.state = SessionState::Reviewing { note, take_path: take_path.clone() };
                Ok(take_path)
            }
            Err(e) => {
                log::warn!("Capture of {} failed: {}", note, e);
                self.state = SessionState::AwaitingCapture { note, countdown: self.new_countdown() };
                Err(e)
            }
        }
    }

    /// Play back the take under review.
    pub fn play_take(&mut self) -> Result<()> {
        let take_path = match &self.state {
            SessionState::Reviewing { take_path, .. } => take_path.clone(),
            _ => return Err(self.invalid("play the take")),
        };
        let take = self.store.read(&take_path)?;
        self.playback.play(&take)
    }

    /// Replay the guide tone while reviewing.
    pub fn play_note(&mut self) -> Result<()> {
        let note = match &self.state {
            SessionState::Reviewing { note, .. } => *note,
            _ => return Err(self.invalid("play the note")),
        };
        self.play_guide_tone(note)
    }

    pub fn decide(&mut self, decision: Decision) -> Result<()> {
        let (note, take_path) = match (&self.state, decision) {
            (SessionState::Reviewing { note, take_path }, _) => (*note, Some(take_path.clone())),
            (SessionState::PlayingGuide { note }, Decision::Skip)
            | (SessionState::AwaitingCapture { note, .. }, Decision::Skip) => (*note, None),
            _ => return Err(self.invalid(&format!("{:?}", decision).to_lowercase())),
        };

        match (decision, take_path) {
            (Decision::Keep, Some(take_path)) => {
                self.keep(note, take_path)?;
                self.advance();
            }
            (Decision::KeepAgain, Some(take_path)) => {
                self.keep(note, take_path)?;
                self.state = SessionState::PlayingGuide { note };
            }
            (Decision::Discard, Some(take_path)) => {
                self.store.delete(&take_path)?;
                log::info!("Discarded {}", take_path.display());
                self.state = SessionState::PlayingGuide { note };
            }
            (Decision::Skip, take_path) => {
                if let Some(take_path) = take_path {
                    self.store.delete(&take_path)?;
                }
                log::info!("Skipped {}", note);
                self.advance();
            }
            // Only Skip reaches here without a take
            (_, None) => return Err(self.invalid("decide")),
        }
        Ok(())
    }

    /// Stop recording early. A take still under review is deleted.
    pub fn finish(&mut self) -> Result<()> {
        match &self.state {
            SessionState::Reviewing { take_path, .. } => {
                let take_path = take_path.clone();
                self.store.delete(&take_path)?;
                log::info!("Dropped undecided take {}", take_path.display());
            }
            SessionState::PlayingGuide { .. } | SessionState::AwaitingCapture { .. } => {}
            SessionState::Finishing => return Ok(()),
            SessionState::AwaitingConfig | SessionState::Done => return Err(self.invalid("finish")),
        }
        log::info!("Finishing with {} kept takes", self.ledger.total_takes());
        self.state = SessionState::Finishing;
        Ok(())
    }

    /// Write the region map as `<output_dir>/<name>.sfz` and end the session.
    /// On failure the session stays in `Finishing`.
    pub fn generate(&mut self, params: &EnvelopeParams, name: &str) -> Result<PathBuf> {
        if self.state != SessionState::Finishing {
            return Err(self.invalid("generate the region map"));
        }
        let file_name = region_map::descriptor_file_name(name)?;
        let path = self.config.output_dir.join(file_name);

        region_map::generate(&self.ledger, &path, &self.config.output_dir, params)?;

        self.descriptor_path = Some(path.clone());
        self.state = SessionState::Done;
        log::info!("Session done: {}", path.display());
        Ok(path)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn ledger(&self) -> &SampleLedger {
        &self.ledger
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn current_note(&self) -> Option<Note> {
        self.state.note()
    }

    /// Notes left including the current one.
    pub fn notes_remaining(&self) -> usize {
        match self.state {
            SessionState::AwaitingConfig | SessionState::Finishing | SessionState::Done => 0,
            _ => self.notes.len() - self.index,
        }
    }

    pub fn descriptor_path(&self) -> Option<&Path> {
        self.descriptor_path.as_deref()
    }

    pub fn playback_device(&self) -> &P {
        &self.playback
    }

    pub fn playback_device_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    pub fn capture_device(&self) -> &C {
        &self.capture
    }

    pub fn capture_device_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    fn new_countdown(&self) -> Countdown {
        Countdown::new(self.config.countdown_secs)
    }

    fn play_guide_tone(&mut self, note: Note) -> Result<()> {
        let tone = guide_tone(
            note,
            self.tuning,
            self.config.waveform,
            self.config.sample_rate_hz,
            self.config.guide_duration_secs,
        )?;
        log::debug!("Guide tone {} at {:.2} Hz", note, note.frequency(self.tuning));
        self.playback.play(&tone)
    }

    fn take_path(&self, note: Note) -> PathBuf {
        let n = self.ledger.take_count(note) + 1;
        self.config.output_dir.join(format!("{}_{}.wav", note, n))
    }

    fn record_take(&mut self, note: Note) -> Result<PathBuf> {
        let take = capture_take(
            &mut self.capture,
            self.config.sample_length_secs,
            self.config.sample_rate_hz,
            SILENCE_THRESHOLD,
        )?;
        let take_path = self.take_path(note);
        if let Err(e) = self.store.write(&take, &take_path) {
            if let Err(cleanup) = self.store.delete(&take_path) {
                log::warn!("Could not remove partial take {}: {}", take_path.display(), cleanup);
            }
            return Err(e);
        }
        Ok(take_path)
    }

    fn keep(&mut self, note: Note, take_path: PathBuf) -> Result<()> {
        if !self.store.exists(&take_path) {
            // Nothing to keep, record the note again
            self.state = SessionState::PlayingGuide { note };
            return Err(RecorderError::IoReadError(format!("{}: take is missing", take_path.display())));
        }
        log::info!("Kept {}", take_path.display());
        self.ledger.push(note, take_path);
        Ok(())
    }

    fn advance(&mut self) {
        self.index += 1;
        self.state = match self.notes.get(self.index) {
            Some(&note) => SessionState::PlayingGuide { note },
            None => {
                log::info!("Reached the end of the note range");
                SessionState::Finishing
            }
        };
    }

    fn invalid(&self, action: &str) -> RecorderError {
        RecorderError::InvalidState(format!("cannot {} while {}", action, self.state))
    }
}
