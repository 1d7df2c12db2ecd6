//  _______           _______  _________  _______  ______   _______
// (  ____ \|\     /|(  ___  )\__   __/ (  ____ )(  ___ \ (  ___  )|\     /|
// | (    \/| )   ( || (   ) |   ) (    | (    )|| (   ) )| (   ) |( \   / )
// | |      | (___) || |   | |   | |    | (____)|| (__/ / | |   | | \ (_) /
// | |      |  ___  || |   | |   | |    |     __)|  __ (  | |   | |  ) _ (
// | |      | (   ) || |   | |   | |    | (\ (   | (  \ \ | |   | | / ( ) \
// | (____/\| )   ( || (___) |___) (___ | ) \ \__| )___) )| (___) |( /   \ )
// (_______/|/     \|(_______)\_______/ |/   \__/|/ \___/ (_______)|/     \|

pub mod error;
pub mod pitch;
pub mod waveform;
pub mod buffer;
pub mod synth;
pub mod capture;
pub mod store;
pub mod device;
pub mod region_map;
pub mod config;
pub mod session;

pub use error::{RecorderError, Result};
pub use pitch::{Note, PitchClass, Tuning, parse_note, note_sequence, start_note_choices};
pub use waveform::WaveformType;
pub use buffer::AudioBuffer;
pub use synth::{synthesize, guide_tone, test_tone};
pub use capture::{post_process, capture_take};
pub use store::{SampleStore, WavStore};
pub use device::{PlaybackDevice, CaptureDevice, CpalPlayback, CpalCapture, DeviceCapabilities, RateRange, supported_sample_rates, preferred_sample_rate};
pub use region_map::{SampleLedger, EnvelopeParams, LoopMode, descriptor_file_name};
pub use config::SessionConfig;
pub use session::{Session, SessionState, Decision, Countdown, CountdownTick};
