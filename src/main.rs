use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;
use std::thread;

use anyhow::{Context, bail};

use choirbox::device::{self, CaptureDevice, PlaybackDevice};
use choirbox::region_map::DEFAULT_DESCRIPTOR_NAME;
use choirbox::session::{GO_DELAY, TICK_INTERVAL};
use choirbox::{
    CountdownTick, CpalCapture, CpalPlayback, Decision, EnvelopeParams, LoopMode, RecorderError, Session,
    SessionConfig, SessionState, WavStore, test_tone,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1) {
        Some(path) => SessionConfig::load(Path::new(&path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => SessionConfig::default(),
    };
    config.validate().context("Invalid session config")?;

    match device::capabilities(config.input_device.as_deref(), config.output_device.as_deref()) {
        Ok(caps) => {
            let rates = device::supported_sample_rates(&caps);
            log::info!("Supported sample rates: {:?}", rates);
            if !rates.contains(&config.sample_rate_hz) {
                log::warn!("{} Hz may not be supported by the selected devices", config.sample_rate_hz);
            }
        }
        Err(e) => log::warn!("Could not probe devices: {}", e),
    }

    let mut playback = CpalPlayback::open(config.output_device.as_deref(), config.sample_rate_hz)
        .context("Failed to open output device")?;
    let mut capture = CpalCapture::open(config.input_device.as_deref(), config.sample_rate_hz)
        .context("Failed to open input device")?;

    println!("Output devices: {}", playback.list_output_devices()?.join(", "));
    println!("Input devices: {}", capture.list_input_devices()?.join(", "));

    if prompt("Play a test tone? [y/N] ")?.eq_ignore_ascii_case("y") {
        playback.play(&test_tone(config.sample_rate_hz)?)?;
    }
    match capture.monitor_level(config.sample_rate_hz) {
        Ok(level) => println!("Input level: {:.3}", level),
        Err(e) => log::warn!("Could not read input level: {}", e),
    }

    let mut session = Session::new(playback, capture, WavStore);
    session.start(config)?;

    loop {
        match session.state().clone() {
            SessionState::AwaitingConfig => bail!("Session was not started"),
            SessionState::PlayingGuide { note } => {
                let answer = prompt(&format!(
                    "{} ({} notes left) [enter] record, [s]kip, [f]inish: ",
                    note,
                    session.notes_remaining()
                ))?;
                let result = match answer.as_str() {
                    "" => session.play_guide(),
                    "s" => session.decide(Decision::Skip),
                    "f" => session.finish(),
                    _ => continue,
                };
                recover(result)?;
            }
            SessionState::AwaitingCapture { .. } => match session.tick_countdown()? {
                CountdownTick::Count(n) => {
                    println!("{}...", n);
                    thread::sleep(TICK_INTERVAL);
                }
                CountdownTick::Go => {
                    println!("Recording!");
                    thread::sleep(GO_DELAY);
                    recover(session.capture().map(|path| println!("Saved {}", path.display())))?;
                }
            },
            SessionState::Reviewing { note, .. } => {
                let answer = prompt(&format!(
                    "{}: [k]eep, keep and record [a]gain, [d]iscard, [s]kip, [p]lay take, play [n]ote, [f]inish: ",
                    note
                ))?;
                let result = match answer.as_str() {
                    "k" => session.decide(Decision::Keep),
                    "a" => session.decide(Decision::KeepAgain),
                    "d" => session.decide(Decision::Discard),
                    "s" => session.decide(Decision::Skip),
                    "p" => session.play_take(),
                    "n" => session.play_note(),
                    "f" => session.finish(),
                    _ => continue,
                };
                recover(result)?;
            }
            SessionState::Finishing => {
                let params = prompt_envelope()?;
                let mut name = prompt(&format!("File name [{}]: ", DEFAULT_DESCRIPTOR_NAME))?;
                if name.is_empty() {
                    name = DEFAULT_DESCRIPTOR_NAME.to_string();
                }
                recover(session.generate(&params, &name).map(|path| println!("Wrote {}", path.display())))?;
            }
            SessionState::Done => break,
        }
    }

    Ok(())
}

/// Report errors the user can retry from and keep going; anything else ends the program.
fn recover(result: choirbox::Result<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_retryable() || matches!(e, RecorderError::InvalidParameter(_)) => {
            eprintln!("{}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("Input closed");
    }
    Ok(line.trim().to_string())
}

fn prompt_value<T: FromStr + std::fmt::Display>(label: &str, default: T) -> anyhow::Result<T> {
    loop {
        let answer = prompt(&format!("{} [{}]: ", label, default))?;
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse() {
            Ok(value) => return Ok(value),
            Err(_) => eprintln!("Could not parse '{}'", answer),
        }
    }
}

fn prompt_envelope() -> anyhow::Result<EnvelopeParams> {
    let defaults = EnvelopeParams::default();
    let attack_secs = prompt_value("Attack (s)", defaults.attack_secs)?;
    let release_secs = prompt_value("Release (s)", defaults.release_secs)?;
    let sustain_percent = prompt_value("Sustain (%)", defaults.sustain_percent)?;
    let velocity_track_percent = prompt_value("Velocity track (%)", defaults.velocity_track_percent)?;
    let loop_mode: LoopMode = prompt_value("Loop mode", defaults.loop_mode)?;

    let (loop_start, loop_end) = if loop_mode.has_loop_points() {
        (
            prompt_value("Loop start", defaults.loop_start)?,
            prompt_value("Loop end", defaults.loop_end)?,
        )
    } else {
        (defaults.loop_start, defaults.loop_end)
    };

    Ok(EnvelopeParams {
        attack_secs,
        release_secs,
        sustain_percent,
        velocity_track_percent,
        loop_mode,
        loop_start,
        loop_end,
    })
}
