use crate::buffer::AudioBuffer;
use crate::device::CaptureDevice;
use crate::error::Result;

pub const SILENCE_THRESHOLD: f32 = 0.01;

// Keeps normalization of a silent take from dividing by zero
pub const NORMALIZE_FLOOR: f32 = 1e-10;

/// Trim leading silence and normalize the peak to 1.0.
///
/// Everything before the first sample louder than `silence_threshold` is
/// dropped. The tail is never trimmed. A take with nothing above the
/// threshold keeps its full length and is still normalized.
pub fn post_process(raw: &AudioBuffer, silence_threshold: f32) -> AudioBuffer {
    let onset = raw
        .samples()
        .iter()
        .position(|s| s.abs() > silence_threshold)
        .unwrap_or(0);
    let trimmed = &raw.samples()[onset..];

    let peak = trimmed.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
    let scale = peak.max(NORMALIZE_FLOOR);

    if onset > 0 {
        log::debug!("Trimmed {} leading samples below {}", onset, silence_threshold);
    }

    raw.with_samples(trimmed.iter().map(|s| s / scale).collect())
}

/// Record one take from `device` and post-process it.
pub fn capture_take<C: CaptureDevice + ?Sized>(
    device: &mut C,
    duration_secs: f64,
    sample_rate: u32,
    silence_threshold: f32,
) -> Result<AudioBuffer> {
    let raw = device.record(duration_secs, sample_rate)?;
    log::debug!("Captured {} samples at {} Hz", raw.len(), raw.sample_rate());
    Ok(post_process(&raw, silence_threshold))
}
