use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig};

use crate::buffer::AudioBuffer;
use crate::error::{RecorderError, Result};

pub const CANDIDATE_SAMPLE_RATES: [u32; 7] = [8000, 16000, 22050, 44100, 48000, 96000, 192000];
pub const FALLBACK_SAMPLE_RATES: [u32; 3] = [44100, 48000, 96000];
pub const PREFERRED_SAMPLE_RATE: u32 = 48000;

// Frames read for one level-meter update
pub const MONITOR_BLOCK_FRAMES: u32 = 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
// Grace period past the nominal length before a stream counts as stalled
const STALL_MARGIN: Duration = Duration::from_secs(2);
// Callbacks past the last sample before the final period counts as played
const TAIL_CALLBACKS: usize = 2;

pub trait PlaybackDevice {
    /// Play `buffer` at its own sample rate, blocking until it has finished.
    fn play(&mut self, buffer: &AudioBuffer) -> Result<()>;
    fn list_output_devices(&self) -> Result<Vec<String>>;
    fn select_output_device(&mut self, name: &str) -> Result<()>;
}

pub trait CaptureDevice {
    /// Record `duration_secs` of mono audio, blocking for the whole duration.
    fn record(&mut self, duration_secs: f64, sample_rate: u32) -> Result<AudioBuffer>;
    fn list_input_devices(&self) -> Result<Vec<String>>;
    fn select_input_device(&mut self, name: &str) -> Result<()>;

    /// Peak level of one short block, for an input meter.
    fn monitor_level(&mut self, sample_rate: u32) -> Result<f32> {
        if sample_rate == 0 {
            return Err(RecorderError::InvalidParameter("sample rate must be positive".to_string()));
        }
        let block = self.record(MONITOR_BLOCK_FRAMES as f64 / sample_rate as f64, sample_rate)?;
        Ok(block.peak())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRange {
    pub min: u32,
    pub max: u32,
    pub channels: u16,
}

impl RateRange {
    pub fn contains(&self, rate: u32) -> bool {
        self.min <= rate && rate <= self.max
    }
}

/// Supported stream ranges of the chosen input and output devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub input: Vec<RateRange>,
    pub output: Vec<RateRange>,
}

/// Candidate rates usable for mono capture or stereo playback, ascending.
/// Falls back to [`FALLBACK_SAMPLE_RATES`] when nothing matches.
pub fn supported_sample_rates(caps: &DeviceCapabilities) -> Vec<u32> {
    let rates: Vec<u32> = CANDIDATE_SAMPLE_RATES
        .into_iter()
        .filter(|&rate| {
            caps.input.iter().any(|r| r.channels >= 1 && r.contains(rate))
                || caps.output.iter().any(|r| r.channels >= 2 && r.contains(rate))
        })
        .collect();

    if rates.is_empty() {
        FALLBACK_SAMPLE_RATES.to_vec()
    } else {
        rates
    }
}

pub fn preferred_sample_rate(rates: &[u32]) -> Option<u32> {
    if rates.contains(&PREFERRED_SAMPLE_RATE) {
        Some(PREFERRED_SAMPLE_RATE)
    } else {
        rates.first().copied()
    }
}

fn device_error(context: &str, err: impl std::fmt::Display) -> RecorderError {
    RecorderError::DeviceError(format!("{}: {}", context, err))
}

fn device_names(devices: impl Iterator<Item = cpal::Device>) -> Vec<String> {
    devices.filter_map(|d| d.name().ok()).collect()
}

fn find_output_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| RecorderError::DeviceError("No output device found".to_string())),
        Some(name) => host
            .output_devices()
            .map_err(|e| device_error("Failed to enumerate output devices", e))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| RecorderError::DeviceError(format!("Output device not found: {}", name))),
    }
}

fn find_input_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| RecorderError::DeviceError("No input device found".to_string())),
        Some(name) => host
            .input_devices()
            .map_err(|e| device_error("Failed to enumerate input devices", e))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| RecorderError::DeviceError(format!("Input device not found: {}", name))),
    }
}

fn output_ranges(device: &cpal::Device) -> Result<Vec<RateRange>> {
    Ok(device
        .supported_output_configs()
        .map_err(|e| device_error("Failed to query output configs", e))?
        .map(|c| RateRange {
            min: c.min_sample_rate().0,
            max: c.max_sample_rate().0,
            channels: c.channels(),
        })
        .collect())
}

fn input_ranges(device: &cpal::Device) -> Result<Vec<RateRange>> {
    Ok(device
        .supported_input_configs()
        .map_err(|e| device_error("Failed to query input configs", e))?
        .map(|c| RateRange {
            min: c.min_sample_rate().0,
            max: c.max_sample_rate().0,
            channels: c.channels(),
        })
        .collect())
}

/// Query the named (or default, when `None`) devices of the default host.
pub fn capabilities(input: Option<&str>, output: Option<&str>) -> Result<DeviceCapabilities> {
    let host = cpal::default_host();
    let input = input_ranges(&find_input_device(&host, input)?)?;
    let output = output_ranges(&find_output_device(&host, output)?)?;
    Ok(DeviceCapabilities { input, output })
}

fn check_rate(ranges: &[RateRange], rate: u32, min_channels: u16, device: &str) -> Result<()> {
    if ranges.iter().any(|r| r.channels >= min_channels && r.contains(rate)) {
        Ok(())
    } else {
        Err(RecorderError::DeviceError(format!(
            "{} does not support {} Hz with {} channel(s)",
            device, rate, min_channels
        )))
    }
}

pub struct CpalPlayback {
    host: cpal::Host,
    device: cpal::Device,
    sample_rate: u32,
}

impl CpalPlayback {
    /// Open the named output device, or the system default for `None`.
    pub fn open(name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = find_output_device(&host, name)?;
        let device_name = device.name().unwrap_or_else(|_| "output device".to_string());
        check_rate(&output_ranges(&device)?, sample_rate, 2, &device_name)?;
        log::debug!("Using output device '{}' at {} Hz", device_name, sample_rate);
        Ok(CpalPlayback { host, device, sample_rate })
    }
}

impl PlaybackDevice for CpalPlayback {
    fn play(&mut self, buffer: &AudioBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let default_config = self
            .device
            .default_output_config()
            .map_err(|e| device_error("Failed to get output config", e))?;
        let config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: SampleRate(buffer.sample_rate()),
            buffer_size: BufferSize::Default,
        };

        let samples = Arc::new(buffer.samples().to_vec());
        let tail_callbacks = Arc::new(AtomicUsize::new(0));

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => {
                build_playback_stream::<f32>(&self.device, &config, Arc::clone(&samples), Arc::clone(&tail_callbacks))
            }
            SampleFormat::I16 => {
                build_playback_stream::<i16>(&self.device, &config, Arc::clone(&samples), Arc::clone(&tail_callbacks))
            }
            SampleFormat::U16 => {
                build_playback_stream::<u16>(&self.device, &config, Arc::clone(&samples), Arc::clone(&tail_callbacks))
            }
            other => {
                return Err(RecorderError::DeviceError(format!("Unsupported output sample format: {:?}", other)));
            }
        }
        .map_err(|e| device_error("Failed to build output stream", e))?;

        stream.play().map_err(|e| device_error("Failed to start playback", e))?;

        let deadline = Instant::now() + Duration::from_secs_f64(buffer.duration_secs()) + STALL_MARGIN;
        while tail_callbacks.load(Ordering::SeqCst) < TAIL_CALLBACKS {
            if Instant::now() > deadline {
                return Err(RecorderError::DeviceError("Playback stalled".to_string()));
            }
            thread::sleep(POLL_INTERVAL);
        }

        Ok(())
    }

    fn list_output_devices(&self) -> Result<Vec<String>> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| device_error("Failed to enumerate output devices", e))?;
        Ok(device_names(devices))
    }

    fn select_output_device(&mut self, name: &str) -> Result<()> {
        let device = find_output_device(&self.host, Some(name))?;
        check_rate(&output_ranges(&device)?, self.sample_rate, 2, name)?;
        log::debug!("Selected output device '{}'", name);
        self.device = device;
        Ok(())
    }
}

// Writes `samples` to every channel. Each callback that runs past the end
// bumps `tail_callbacks`.
fn build_playback_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Arc<Vec<f32>>,
    tail_callbacks: Arc<AtomicUsize>,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut position = 0usize;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if fill_frames(data, channels, &samples, &mut position) {
                tail_callbacks.fetch_add(1, Ordering::SeqCst);
            }
        },
        |err| log::error!("Output stream error: {}", err),
        None,
    )
}

/// Copy mono `samples` from `position` into every channel of `data`,
/// padding with silence. Returns true once the end has been reached.
fn fill_frames<T>(data: &mut [T], channels: usize, samples: &[f32], position: &mut usize) -> bool
where
    T: Sample + FromSample<f32>,
{
    let mut past_end = false;
    for frame in data.chunks_mut(channels.max(1)) {
        let value = match samples.get(*position) {
            Some(&s) => {
                *position += 1;
                s
            }
            None => {
                past_end = true;
                0.0
            }
        };
        for sample in frame.iter_mut() {
            *sample = T::from_sample(value);
        }
    }
    past_end
}

/// Device samples as f32 in -1.0..1.0.
fn to_f32_samples<T>(data: &[T]) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    data.iter().map(|&s| f32::from_sample(s)).collect()
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

// Appends converted samples until `target` is reached. Stream errors land in `failure`.
fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    captured: Arc<Mutex<Vec<f32>>>,
    failure: Arc<Mutex<Option<String>>>,
    target: usize,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if let Ok(mut buf) = captured.lock() {
                let room = target.saturating_sub(buf.len());
                buf.extend(to_f32_samples(&data[..data.len().min(room)]));
            }
        },
        move |err| {
            log::error!("Input stream error: {}", err);
            if let Ok(mut slot) = failure.lock() {
                *slot = Some(err.to_string());
            }
        },
        None,
    )
}

pub struct CpalCapture {
    host: cpal::Host,
    device: cpal::Device,
    sample_rate: u32,
}

impl CpalCapture {
    /// Open the named input device, or the system default for `None`.
    pub fn open(name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = find_input_device(&host, name)?;
        let device_name = device.name().unwrap_or_else(|_| "input device".to_string());
        check_rate(&input_ranges(&device)?, sample_rate, 1, &device_name)?;
        check_input_format(&device, &device_name)?;
        log::debug!("Using input device '{}' at {} Hz", device_name, sample_rate);
        Ok(CpalCapture { host, device, sample_rate })
    }
}

fn check_input_format(device: &cpal::Device, name: &str) -> Result<()> {
    let format = device
        .default_input_config()
        .map_err(|e| device_error("Failed to get input config", e))?
        .sample_format();
    if is_supported_format(format) {
        Ok(())
    } else {
        Err(RecorderError::DeviceError(format!("{} records {:?} samples, which are not supported", name, format)))
    }
}

impl CaptureDevice for CpalCapture {
    fn record(&mut self, duration_secs: f64, sample_rate: u32) -> Result<AudioBuffer> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(RecorderError::InvalidParameter(format!(
                "capture duration must be positive, got {}",
                duration_secs
            )));
        }
        if sample_rate == 0 {
            return Err(RecorderError::InvalidParameter("sample rate must be positive".to_string()));
        }

        let frames = (duration_secs * sample_rate as f64).round() as usize;
        if frames == 0 {
            return AudioBuffer::silence(0, sample_rate);
        }

        let default_config = self
            .device
            .default_input_config()
            .map_err(|e| device_error("Failed to get input config", e))?;
        let channels = default_config.channels();
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let target = frames * channels as usize;
        let captured = Arc::new(Mutex::new(Vec::<f32>::with_capacity(target)));
        let failure = Arc::new(Mutex::new(None::<String>));

        let cb_captured = Arc::clone(&captured);
        let cb_failure = Arc::clone(&failure);

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => build_capture_stream::<f32>(&self.device, &config, cb_captured, cb_failure, target),
            SampleFormat::I16 => build_capture_stream::<i16>(&self.device, &config, cb_captured, cb_failure, target),
            SampleFormat::U16 => build_capture_stream::<u16>(&self.device, &config, cb_captured, cb_failure, target),
            other => {
                return Err(RecorderError::CaptureError(format!("Unsupported input sample format: {:?}", other)));
            }
        }
        .map_err(|e| RecorderError::CaptureError(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| RecorderError::CaptureError(format!("Failed to start recording: {}", e)))?;

        let deadline = Instant::now() + Duration::from_secs_f64(duration_secs) + STALL_MARGIN;
        loop {
            if let Some(msg) = failure.lock().ok().and_then(|slot| slot.clone()) {
                return Err(RecorderError::CaptureError(msg));
            }
            let filled = captured.lock().map(|buf| buf.len()).unwrap_or(0);
            if filled >= target {
                break;
            }
            if Instant::now() > deadline {
                return Err(RecorderError::CaptureError(format!(
                    "Recording stalled after {} of {} samples",
                    filled, target
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
        drop(stream);

        let data = captured
            .lock()
            .map_err(|_| RecorderError::CaptureError("Capture buffer poisoned".to_string()))?;
        AudioBuffer::from_interleaved(&data, channels, sample_rate)
    }

    fn list_input_devices(&self) -> Result<Vec<String>> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| device_error("Failed to enumerate input devices", e))?;
        Ok(device_names(devices))
    }

    fn select_input_device(&mut self, name: &str) -> Result<()> {
        let device = find_input_device(&self.host, Some(name))?;
        check_rate(&input_ranges(&device)?, self.sample_rate, 1, name)?;
        log::debug!("Selected input device '{}'", name);
        self.device = device;
        Ok(())
    }
}
