use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RecorderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformType {
    Sine,
    #[default]
    Triangle,
    Square,
}

impl WaveformType {
    /// Raw, unscaled value at time `t` seconds for a tone of `frequency` Hz.
    pub fn generate_sample(&self, frequency: f64, t: f64) -> f64 {
        match self {
            WaveformType::Sine => (TAU * frequency * t).sin(),
            WaveformType::Square => {
                // sign(0) must stay 0, which f64::signum does not give
                let s = (TAU * frequency * t).sin();
                if s > 0.0 {
                    1.0
                } else if s < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            WaveformType::Triangle => {
                let cycles = frequency * t;
                2.0 * (2.0 * (cycles - (cycles + 0.5).floor())).abs() - 1.0
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WaveformType::Sine => "sine",
            WaveformType::Triangle => "triangle",
            WaveformType::Square => "square",
        }
    }
}

impl fmt::Display for WaveformType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveformType {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sine" => Ok(WaveformType::Sine),
            "triangle" => Ok(WaveformType::Triangle),
            "square" => Ok(WaveformType::Square),
            other => Err(RecorderError::InvalidParameter(format!("unknown waveform '{}'", other))),
        }
    }
}
