use std::fmt;
use std::str::FromStr;

use crate::error::{RecorderError, Result};

pub const MAX_OCTAVE: u8 = 10;

// MIDI-style number of A4, the tuning reference
const REFERENCE_MIDI: i32 = 69;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Offset above C within the octave, 0..=11.
    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_uppercase();
        PitchClass::ALL.into_iter().find(|pc| pc.name() == name)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference frequency for A4 in Hz.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tuning(f64);

impl Tuning {
    pub const STANDARD: Tuning = Tuning(440.0);

    pub fn new(hz: f64) -> Result<Self> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(RecorderError::InvalidParameter(format!(
                "tuning must be a positive frequency, got {}",
                hz
            )));
        }
        Ok(Tuning(hz))
    }

    pub fn hz(self) -> f64 {
        self.0
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::STANDARD
    }
}

// Field order makes the derived ordering ascend by pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note {
    octave: u8,
    pitch_class: PitchClass,
}

impl Note {
    pub const MIDDLE_C: Note = Note { octave: 4, pitch_class: PitchClass::C };

    pub fn new(pitch_class: PitchClass, octave: u8) -> Result<Self> {
        if octave > MAX_OCTAVE {
            return Err(RecorderError::InvalidNoteFormat(format!(
                "octave {} is above {}",
                octave, MAX_OCTAVE
            )));
        }
        Ok(Note { octave, pitch_class })
    }

    pub fn pitch_class(self) -> PitchClass {
        self.pitch_class
    }

    pub fn octave(self) -> u8 {
        self.octave
    }

    /// MIDI-style number, `12 * (octave + 1) + semitone`. Drives frequency only.
    pub fn midi_number(self) -> i32 {
        12 * (self.octave as i32 + 1) + self.pitch_class.semitone() as i32
    }

    /// Equal-temperament frequency relative to the A4 reference.
    pub fn frequency(self, tuning: Tuning) -> f64 {
        2.0_f64.powf((self.midi_number() - REFERENCE_MIDI) as f64 / 12.0) * tuning.hz()
    }

    /// Key number written into the region map, `12 * octave + semitone`.
    /// Deliberately one octave below `midi_number`.
    pub fn descriptor_key(self) -> u32 {
        12 * self.octave as u32 + self.pitch_class.semitone() as u32
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Note {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self> {
        parse_note(s)
    }
}

/// Parse names like `C4`, `f#2` or `A10`. Trailing digits are the octave.
pub fn parse_note(note_str: &str) -> Result<Note> {
    let note_str = note_str.trim();
    let name = note_str.trim_end_matches(|c: char| c.is_ascii_digit());
    let octave_str = &note_str[name.len()..];

    let pitch_class = PitchClass::from_name(name).ok_or_else(|| {
        RecorderError::InvalidNoteFormat(format!("unknown pitch class in '{}'", note_str))
    })?;

    let octave: u8 = octave_str.parse().map_err(|_| {
        RecorderError::InvalidNoteFormat(format!("missing or invalid octave in '{}'", note_str))
    })?;

    Note::new(pitch_class, octave)
}

/// Every note from C of `first_octave` to B of `last_octave`, ascending.
pub fn note_sequence(first_octave: u8, last_octave: u8) -> Vec<Note> {
    let last_octave = last_octave.min(MAX_OCTAVE);
    (first_octave..=last_octave)
        .flat_map(|octave| {
            PitchClass::ALL
                .into_iter()
                .map(move |pitch_class| Note { octave, pitch_class })
        })
        .collect()
}

/// Notes offered as a session starting point: C2 through C5.
pub fn start_note_choices() -> Vec<Note> {
    let mut notes = note_sequence(2, 4);
    notes.push(Note { octave: 5, pitch_class: PitchClass::C });
    notes
}
