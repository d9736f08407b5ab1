//! Controller lifecycle against the in-memory sink.

use dt_audio::{AudioSink, MemoryOpener, SinkError, SinkEvent};
use dt_master::{
    Channel, ChannelSelect, Controller, EngineConfig, EngineError, EngineState, ToneSettings,
    WaveformKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const BLOCK: usize = 256;

fn controller(opener: MemoryOpener) -> Controller {
    Controller::with_settings(
        opener,
        EngineConfig::default().with_block_size(BLOCK),
        ToneSettings::default(),
    )
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn second_start_is_noop() {
    let opener = MemoryOpener::new().with_write_delay(Duration::from_millis(1));
    let capture = opener.capture();
    let mut ctrl = controller(opener);
    ctrl.set_binaural_beat(300.0, 307.0).unwrap();

    ctrl.start().unwrap();
    ctrl.start().unwrap();
    assert!(wait_until(|| capture.write_count() >= 8));
    ctrl.stop();

    assert_eq!(capture.open_count(), 1);
    assert_eq!(capture.close_count(), 1);

    // One producer means one unbroken phase-continuous stream
    let frames = capture.frames();
    let expected = ctrl.render_frames(frames.len());
    assert_eq!(frames, expected);
}

#[test]
fn stop_never_overlaps_a_write() {
    let opener = MemoryOpener::new().with_write_delay(Duration::from_millis(5));
    let capture = opener.capture();
    let mut ctrl = controller(opener);

    for cycle in 0..10 {
        ctrl.start().unwrap();
        // Vary where in the write the stop lands
        thread::sleep(Duration::from_millis(cycle % 7));
        ctrl.stop();
        assert_eq!(ctrl.state(), EngineState::Stopped);
        assert_eq!(capture.events().last(), Some(&SinkEvent::Closed));
    }

    assert_eq!(capture.open_count(), 10);
    assert_eq!(capture.close_count(), 10);
    assert!(capture.violations().is_empty(), "{:?}", capture.violations());
}

#[test]
fn no_write_after_stop_returns() {
    let opener = MemoryOpener::new().with_write_delay(Duration::from_millis(2));
    let capture = opener.capture();
    let mut ctrl = controller(opener);

    ctrl.start().unwrap();
    assert!(wait_until(|| capture.write_count() >= 2));
    ctrl.stop();
    let writes = capture.write_count();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(capture.write_count(), writes);
}

#[test]
fn volume_change_reaches_running_stream() {
    let opener = MemoryOpener::new().with_write_delay(Duration::from_millis(1));
    let capture = opener.capture();
    let mut ctrl = controller(opener);

    ctrl.start().unwrap();
    assert!(wait_until(|| capture.write_count() >= 2));
    ctrl.set_volume(ChannelSelect::Both, 0.0).unwrap();
    let seen = capture.write_count();
    assert!(wait_until(|| capture.write_count() >= seen + 3));
    ctrl.stop();

    let frames = capture.frames();
    let last_block = &frames[frames.len() - BLOCK..];
    assert!(last_block.iter().all(|f| f.left == 0.0 && f.right == 0.0));
    assert!(frames[..BLOCK].iter().any(|f| f.left != 0.0));
}

#[test]
fn waveform_change_reaches_running_stream() {
    let opener = MemoryOpener::new().with_write_delay(Duration::from_millis(1));
    let capture = opener.capture();
    let mut ctrl = controller(opener);
    ctrl.set_volume(ChannelSelect::Both, 0.2).unwrap();

    ctrl.start().unwrap();
    ctrl.set_waveform(WaveformKind::Square).unwrap();
    let seen = capture.write_count();
    assert!(wait_until(|| capture.write_count() >= seen + 3));
    ctrl.stop();

    let frames = capture.frames();
    let last_block = &frames[frames.len() - BLOCK..];
    assert!(last_block.iter().all(|f| f.left.abs() == 0.2 && f.right.abs() == 0.2));
}

#[test]
fn released_engine_round_trip() {
    let opener = MemoryOpener::new().with_write_delay(Duration::from_millis(1));
    let capture = opener.capture();
    let mut ctrl = controller(opener);

    ctrl.start().unwrap();
    assert!(wait_until(|| capture.write_count() >= 1));
    ctrl.release();
    assert_eq!(ctrl.state(), EngineState::Released);
    assert!(!ctrl.is_playing());
    assert_eq!(capture.close_count(), 1);

    assert!(matches!(ctrl.start(), Err(EngineError::Released)));
    assert!(matches!(ctrl.apply_frequency(500.0), Err(EngineError::Released)));
    assert!(matches!(ctrl.set_binaural_beat(1.0, 2.0), Err(EngineError::Released)));
    assert!(matches!(
        ctrl.set_channel_waveform(Channel::Left, WaveformKind::Triangle),
        Err(EngineError::Released)
    ));
    ctrl.stop();
    ctrl.release();

    // Readers keep working and report the last accepted values
    assert_eq!(ctrl.frequency(Channel::Left), 440.0);
    assert_eq!(capture.open_count(), 1);
}

#[test]
fn failed_open_is_not_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let memory = MemoryOpener::new().with_write_delay(Duration::from_millis(1));
    let capture = memory.capture();

    let opener = {
        let attempts = attempts.clone();
        let mut memory = memory.clone();
        move |rate: u32, channels: u16| -> Result<Box<dyn AudioSink>, SinkError> {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SinkError::DeviceUnavailable("no device yet".into()));
            }
            dt_audio::SinkOpener::open(&mut memory, rate, channels)
        }
    };
    let mut ctrl = Controller::with_settings(
        opener,
        EngineConfig::default().with_block_size(BLOCK),
        ToneSettings::default(),
    );

    let err = ctrl.start().unwrap_err();
    assert!(matches!(err, EngineError::DeviceUnavailable(_)));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(ctrl.state(), EngineState::Stopped);

    ctrl.start().unwrap();
    assert!(wait_until(|| capture.write_count() >= 1));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    ctrl.stop();
    assert_eq!(capture.close_count(), 1);
}

#[test]
fn opener_receives_configured_rate() {
    let opener = MemoryOpener::new().with_write_delay(Duration::from_millis(1));
    let capture = opener.capture();
    let mut ctrl = Controller::with_settings(
        opener,
        EngineConfig::default().with_sample_rate(22050).with_block_size(BLOCK),
        ToneSettings::default(),
    );

    ctrl.start().unwrap();
    assert!(wait_until(|| capture.write_count() >= 1));
    ctrl.stop();

    assert_eq!(
        capture.events().first(),
        Some(&SinkEvent::Opened {
            sample_rate: 22050,
            channels: 2
        })
    );
}

#[test]
fn restart_after_fault_runs_a_fresh_producer() {
    let opener = MemoryOpener::new().failing_after(1);
    let capture = opener.capture();
    let mut ctrl = controller(opener);

    ctrl.start().unwrap();
    assert!(wait_until(|| !ctrl.is_playing()));
    assert!(ctrl.last_fault().is_some());

    ctrl.start().unwrap();
    assert!(wait_until(|| capture.open_count() == 2));
    // The second sink also fails after one write; the fault reappears
    assert!(wait_until(|| !ctrl.is_playing()));
    assert!(ctrl.last_fault().is_some());
    assert!(capture.violations().is_empty());
}

#[test]
fn renders_at_rate_the_sink_reports() {
    // A device that only runs at 48 kHz, whatever was asked for
    let memory = MemoryOpener::new().with_write_delay(Duration::from_millis(1));
    let capture = memory.capture();
    let opener = {
        let mut memory = memory.clone();
        move |_rate: u32, channels: u16| -> Result<Box<dyn AudioSink>, SinkError> {
            dt_audio::SinkOpener::open(&mut memory, 48000, channels)
        }
    };
    let mut ctrl = Controller::with_settings(
        opener,
        EngineConfig::default().with_sample_rate(44100).with_block_size(BLOCK),
        ToneSettings {
            left_hz: 480.0,
            right_hz: 480.0,
            ..ToneSettings::default()
        },
    );

    ctrl.start().unwrap();
    assert!(wait_until(|| capture.frame_count() >= 48000));
    ctrl.stop();

    // 480 Hz at 48 kHz is exactly 100 samples per cycle
    let frames = capture.frames();
    let second = &frames[..48000];
    let mut crossings = 0;
    for pair in second.windows(2) {
        if (pair[0].left >= 0.0) != (pair[1].left >= 0.0) {
            crossings += 1;
        }
    }
    assert!((958..=961).contains(&crossings), "{} crossings", crossings);
}
