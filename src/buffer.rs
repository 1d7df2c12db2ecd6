use crate::error::{RecorderError, Result};

/// Mono f32 samples tagged with their sample rate. Stages hand each other
/// new buffers instead of mutating one in place.
///
/// The sample rate is never zero; every constructor checks or inherits it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(RecorderError::InvalidParameter("sample rate must be positive".to_string()));
        }
        Ok(AudioBuffer { samples, sample_rate })
    }

    pub fn silence(len: usize, sample_rate: u32) -> Result<Self> {
        Self::new(vec![0.0; len], sample_rate)
    }

    /// New buffer at this buffer's sample rate.
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        AudioBuffer { samples, sample_rate: self.sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value, 0.0 for an empty buffer.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |max, &s| max.max(s.abs()))
    }

    /// Average interleaved frames of `channels` samples down to one channel.
    pub fn from_interleaved(data: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(RecorderError::InvalidParameter("channel count must be positive".to_string()));
        }
        let samples = if channels == 1 {
            data.to_vec()
        } else {
            data.chunks(channels as usize)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };
        Self::new(samples, sample_rate)
    }
}
