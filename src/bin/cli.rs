//! duotone CLI: play a tone pair or write it to WAV.
//!
//! Usage:
//!   dt-cli --left 200 --right 204 --wave sine --seconds 30
//!   dt-cli --left 432 --beat 8 --volume 0.2 --wav output.wav

use dt_master::{Controller, EngineConfig, ToneSettings, WaveformKind};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::info;

const USAGE: &str = "Usage: dt-cli [--left HZ] [--right HZ | --beat HZ] [--volume 0..0.3] \
[--wave sine|square|sawtooth|triangle] [--seconds N] [--rate HZ] [--block FRAMES] [--wav output.wav]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    let defaults = ToneSettings::default();
    let left_hz = parse_flag(&args, "--left").unwrap_or(defaults.left_hz);
    let right_hz = match parse_flag::<f32>(&args, "--beat") {
        Some(beat) => left_hz + beat,
        None => parse_flag(&args, "--right").unwrap_or(left_hz),
    };
    let volume = parse_flag(&args, "--volume").unwrap_or(defaults.left_volume);
    let waveform = parse_flag::<WaveformKind>(&args, "--wave").unwrap_or(defaults.waveform);
    let seconds = parse_flag(&args, "--seconds").unwrap_or(10.0f32);
    if !seconds.is_finite() || seconds < 0.0 {
        eprintln!("--seconds must be a non-negative number");
        std::process::exit(1);
    }

    let mut config = EngineConfig::default();
    if let Some(rate) = parse_flag(&args, "--rate") {
        config = config.with_sample_rate(rate);
    }
    if let Some(block) = parse_flag(&args, "--block") {
        config = config.with_block_size(block);
    }

    let settings = ToneSettings {
        left_hz,
        right_hz,
        left_volume: volume,
        right_volume: volume,
        waveform,
    };
    let ctrl = Controller::with_settings(dt_master::CpalOpener::new(), config, settings);

    let s = ctrl.settings();
    println!("Left:     {:.2} Hz", s.left_hz);
    println!("Right:    {:.2} Hz", s.right_hz);
    println!("Beat:     {:.2} Hz", s.beat_hz());
    println!("Volume:   {:.2} / {:.2}", s.left_volume, s.right_volume);
    println!("Waveform: {}", s.waveform);
    let config = ctrl.config();
    println!(
        "Block:    {} frames ({:.1} ms)",
        config.block_size,
        config.block_duration().as_secs_f64() * 1000.0
    );
    println!();

    match flag_value(&args, "--wav") {
        Some(path) => render_to_wav(&ctrl, path, seconds),
        None => play_audio(ctrl, seconds),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_flag<T: FromStr>(args: &[String], flag: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = flag_value(args, flag)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            eprintln!("Invalid value for {}: {} ({})", flag, raw, e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    }
}

fn play_audio(mut ctrl: Controller, seconds: f32) {
    if let Err(e) = ctrl.start() {
        eprintln!("Failed to start audio: {}", e);
        std::process::exit(1);
    }
    info!("playing for {:.1} s", seconds);

    let started = Instant::now();
    let duration = Duration::from_secs_f32(seconds.max(0.0));
    while ctrl.is_playing() && started.elapsed() < duration {
        print!("\rElapsed: {:>6.1} s", started.elapsed().as_secs_f32());
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(100));
    }

    if let Some(fault) = ctrl.last_fault() {
        println!();
        eprintln!("Playback stopped: {}", fault);
    }
    ctrl.release();
    println!("\rDone.              ");
}

fn render_to_wav(ctrl: &Controller, path: &str, seconds: f32) {
    let sample_rate = ctrl.config().sample_rate;
    println!("Rendering {:.1} s to {} at {} Hz...", seconds, path, sample_rate);

    let file = File::create(path).unwrap_or_else(|e| {
        eprintln!("Failed to create {}: {}", path, e);
        std::process::exit(1);
    });
    let mut out = BufWriter::new(file);
    let written = ctrl
        .write_wav_to(&mut out, seconds)
        .and_then(|()| out.flush().map_err(Into::into));
    if let Err(e) = written {
        eprintln!("Failed to write {}: {}", path, e);
        std::process::exit(1);
    }

    println!("Done.");
}
