use crate::buffer::AudioBuffer;
use crate::error::{RecorderError, Result};
use crate::pitch::{Note, Tuning};
use crate::waveform::WaveformType;

pub const HEADROOM: f64 = 0.98;
pub const GUIDE_DURATION_SECS: f64 = 2.0;

const TEST_TONE_HZ: f64 = 440.0;
const TEST_TONE_AMPLITUDE: f64 = 0.5;

/// Render `duration_secs` of a tone at `frequency` Hz.
///
/// Every sample is scaled by [`HEADROOM`]. Tones below middle C (under the
/// given tuning) are doubled an octave up and the two layers averaged so
/// low guide notes stay audible on small speakers. No further clipping
/// guard is applied.
pub fn synthesize(
    frequency: f64,
    duration_secs: f64,
    sample_rate: u32,
    kind: WaveformType,
    tuning: Tuning,
) -> Result<AudioBuffer> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(RecorderError::InvalidParameter(format!("frequency must be positive, got {}", frequency)));
    }
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(RecorderError::InvalidParameter(format!("duration must be positive, got {}", duration_secs)));
    }
    if sample_rate == 0 {
        return Err(RecorderError::InvalidParameter("sample rate must be positive".to_string()));
    }

    let rate = sample_rate as f64;
    let len = (rate * duration_secs).round() as usize;
    let sub_bass = frequency < Note::MIDDLE_C.frequency(tuning);

    let samples = (0..len)
        .map(|i| {
            let t = i as f64 / rate;
            let mut value = HEADROOM * kind.generate_sample(frequency, t);
            if sub_bass {
                value += HEADROOM * kind.generate_sample(frequency * 2.0, t);
                value /= 2.0;
            }
            value as f32
        })
        .collect();

    AudioBuffer::new(samples, sample_rate)
}

/// Guide tone for `note`, played before each take and on "play note" during review.
pub fn guide_tone(
    note: Note,
    tuning: Tuning,
    kind: WaveformType,
    sample_rate: u32,
    duration_secs: f64,
) -> Result<AudioBuffer> {
    synthesize(note.frequency(tuning), duration_secs, sample_rate, kind, tuning)
}

/// One second of a quiet A440 sine for checking the output device.
pub fn test_tone(sample_rate: u32) -> Result<AudioBuffer> {
    if sample_rate == 0 {
        return Err(RecorderError::InvalidParameter("sample rate must be positive".to_string()));
    }
    let rate = sample_rate as f64;
    let samples = (0..sample_rate)
        .map(|i| (TEST_TONE_AMPLITUDE * WaveformType::Sine.generate_sample(TEST_TONE_HZ, i as f64 / rate)) as f32)
        .collect();
    AudioBuffer::new(samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::parse_note;

    const A440: Tuning = Tuning::STANDARD;

    #[test]
    fn test_length_is_rounded_rate_times_duration() {
        let buffer = synthesize(440.0, 2.5, 48000, WaveformType::Sine, A440).unwrap();
        assert_eq!(buffer.len(), 120_000);
        assert_eq!(buffer.sample_rate(), 48000);

        let buffer = synthesize(440.0, 0.00001, 44100, WaveformType::Sine, A440).unwrap();
        assert_eq!(buffer.len(), 0);

        // 44100 * 0.7 lands a hair under 30870 in floating point
        let buffer = synthesize(440.0, 0.7, 44100, WaveformType::Sine, A440).unwrap();
        assert_eq!(buffer.len(), 30_870);
    }

    #[test]
    fn test_sub_bass_blend_does_not_clip() {
        let buffer = synthesize(100.0, 1.0, 48000, WaveformType::Sine, A440).unwrap();
        assert!(buffer.peak() <= 0.98 + 1e-6);
    }

    #[test]
    fn test_sub_bass_blend_formula() {
        let f = 100.0;
        let rate = 48000;
        let buffer = synthesize(f, 0.01, rate, WaveformType::Sine, A440).unwrap();
        for (i, &s) in buffer.samples().iter().enumerate() {
            let t = i as f64 / rate as f64;
            let expected = (0.98 * (std::f64::consts::TAU * f * t).sin()
                + 0.98 * (std::f64::consts::TAU * 2.0 * f * t).sin())
                / 2.0;
            assert!((s as f64 - expected).abs() < 1e-6, "sample {} differs", i);
        }
    }

    #[test]
    fn test_above_middle_c_is_single_layer() {
        let buffer = synthesize(440.0, 1.0, 48000, WaveformType::Sine, A440).unwrap();
        assert!((buffer.peak() - 0.98).abs() < 1e-3);

        // 1/4 period of 440 Hz is not an integer sample index at 48k, so check directly
        let t = 7.0 / 48000.0;
        let expected = 0.98 * (std::f64::consts::TAU * 440.0 * t).sin();
        assert!((buffer.samples()[7] as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sub_bass_threshold_follows_tuning() {
        // Middle C under A=220 is ~130.8 Hz, so 200 Hz is a single layer
        let low_tuning = Tuning::new(220.0).unwrap();
        let buffer = synthesize(200.0, 0.1, 48000, WaveformType::Sine, low_tuning).unwrap();
        let t = 10.0 / 48000.0;
        let expected = 0.98 * (std::f64::consts::TAU * 200.0 * t).sin();
        assert!((buffer.samples()[10] as f64 - expected).abs() < 1e-6);

        let blended = synthesize(200.0, 0.1, 48000, WaveformType::Sine, A440).unwrap();
        assert!((blended.samples()[10] as f64 - expected).abs() > 1e-3);
    }

    #[test]
    fn test_square_starts_at_zero() {
        let buffer = synthesize(500.0, 0.01, 48000, WaveformType::Square, A440).unwrap();
        assert_eq!(buffer.samples()[0], 0.0);
        assert!((buffer.samples()[1] - 0.98).abs() < 1e-6);
    }

    #[test]
    fn test_triangle_starts_at_negative_headroom() {
        let buffer = synthesize(500.0, 0.01, 48000, WaveformType::Triangle, A440).unwrap();
        assert!((buffer.samples()[0] + 0.98).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(synthesize(0.0, 1.0, 48000, WaveformType::Sine, A440).is_err());
        assert!(synthesize(440.0, -1.0, 48000, WaveformType::Sine, A440).is_err());
        assert!(synthesize(440.0, 1.0, 0, WaveformType::Sine, A440).is_err());
        assert!(synthesize(f64::NAN, 1.0, 48000, WaveformType::Sine, A440).is_err());
    }

    #[test]
    fn test_guide_tone_uses_note_frequency() {
        let a4 = parse_note("A4").unwrap();
        let guide = guide_tone(a4, A440, WaveformType::Sine, 48000, GUIDE_DURATION_SECS).unwrap();
        let direct = synthesize(440.0, 2.0, 48000, WaveformType::Sine, A440).unwrap();
        assert_eq!(guide, direct);
        assert_eq!(guide.len(), 96_000);
    }

    #[test]
    fn test_test_tone() {
        let tone = test_tone(8000).unwrap();
        assert_eq!(tone.len(), 8000);
        assert!((tone.peak() - 0.5).abs() < 1e-3);
    }
}
