//! Headless engine controller for duotone.
//!
//! Owns the oscillator parameters and the lifecycle of one producer thread
//! writing into an audio sink. Shared by the CLI and any other front end.

mod config;
mod error;
mod producer;
mod state;
mod wav;

use dt_audio::SinkOpener;
use dt_dsp::{BlockRenderer, ToneParams, CHANNELS};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

use producer::{launch, ProducerExit, ProducerShared};
use state::AtomicEngineState;

// Re-export common types so callers don't need dt-dsp/dt-audio directly.
pub use config::EngineConfig;
pub use dt_audio::{CpalOpener, MemoryOpener, SinkError};
pub use dt_dsp::{Channel, ChannelSelect, StereoFrame, ToneSettings, WaveformKind, MAX_VOLUME};
pub use error::{EngineError, ProducerFault};
pub use state::EngineState;
pub use wav::{frames_to_wav, write_wav, MAX_WAV_FRAMES};

type Listener = Box<dyn Fn(&ToneSettings) + Send>;

/// Dual-channel tone engine.
///
/// `start`, `stop` and `release` drive the lifecycle; the setters may be
/// called at any time and are picked up by the next rendered block.
///
/// After `release()`, `start()` and every setter fail with
/// [`EngineError::Released`]; `stop()` and `release()` stay no-ops.
pub struct Controller {
    opener: Box<dyn SinkOpener>,
    config: EngineConfig,
    params: Arc<ToneParams>,
    state: Arc<AtomicEngineState>,
    fault: Arc<Mutex<Option<ProducerFault>>>,
    producer: Option<ProducerHandle>,
    listener: Option<Listener>,
}

struct ProducerHandle {
    thread: JoinHandle<ProducerExit>,
}

impl Controller {
    pub fn new(opener: impl SinkOpener + 'static) -> Self {
        Self::with_settings(opener, EngineConfig::default(), ToneSettings::default())
    }

    pub fn with_settings(
        opener: impl SinkOpener + 'static,
        config: EngineConfig,
        settings: ToneSettings,
    ) -> Self {
        let config = config
            .with_sample_rate(config.sample_rate)
            .with_block_size(config.block_size);
        Self {
            opener: Box::new(opener),
            config,
            params: Arc::new(ToneParams::from_settings(&settings)),
            state: Arc::new(AtomicEngineState::new(EngineState::Stopped)),
            fault: Arc::new(Mutex::new(None)),
            producer: None,
            listener: None,
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    // --- Lifecycle ---

    /// Open the sink and launch the producer. No-op while already running.
    pub fn start(&mut self) -> Result<(), EngineError> {
        match self.state.load() {
            EngineState::Released => return Err(EngineError::Released),
            EngineState::Running | EngineState::Starting => {
                debug!("start ignored, engine already {}", self.state.load());
                return Ok(());
            }
            EngineState::Stopped | EngineState::Stopping => {}
        }

        // A producer that faulted on its own has not been joined yet
        self.reap();

        self.state.store(EngineState::Starting);
        let sink = match self.opener.open(self.config.sample_rate, CHANNELS) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("failed to open sink: {}", e);
                self.state.store(EngineState::Stopped);
                return Err(EngineError::DeviceUnavailable(e));
            }
        };

        // Render at whatever rate the sink actually runs at
        let sample_rate = sink.sample_rate();
        let renderer = BlockRenderer::new(sample_rate, self.config.block_size);
        self.clear_fault();
        let shared = ProducerShared {
            params: self.params.clone(),
            state: self.state.clone(),
            fault: self.fault.clone(),
        };

        self.state.store(EngineState::Running);
        let spawned = launch(sink, renderer, shared, |body| {
            thread::Builder::new().name("dt-producer".into()).spawn(body)
        });

        match spawned {
            Ok(thread) => {
                self.producer = Some(ProducerHandle { thread });
                debug!(
                    "engine started: {} Hz, {} frame blocks",
                    sample_rate, self.config.block_size
                );
                Ok(())
            }
            Err(e) => {
                error!("failed to spawn producer: {}", e);
                self.state.store(EngineState::Stopped);
                Err(EngineError::Spawn(e))
            }
        }
    }

    /// Halt the producer, wait for it to exit, then close the sink.
    ///
    /// Blocks for at most the block being written when called.
    pub fn stop(&mut self) {
        let Some(handle) = self.producer.take() else {
            return;
        };
        // Fails harmlessly if the producer already faulted to Stopped
        self.state.transition(EngineState::Running, EngineState::Stopping);
        Self::join(handle);
        self.state.transition(EngineState::Stopping, EngineState::Stopped);
        debug!("engine stopped");
    }

    /// Stop and permanently retire the engine.
    pub fn release(&mut self) {
        if self.state.load() == EngineState::Released {
            return;
        }
        self.stop();
        self.state.store(EngineState::Released);
        self.listener = None;
        debug!("engine released");
    }

    pub fn is_playing(&self) -> bool {
        self.state.load() == EngineState::Running
    }

    pub fn state(&self) -> EngineState {
        self.state.load()
    }

    /// Why the producer last stopped on its own, if it did.
    pub fn last_fault(&self) -> Option<ProducerFault> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn clear_fault(&self) {
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn reap(&mut self) {
        if let Some(handle) = self.producer.take() {
            Self::join(handle);
        }
    }

    fn join(handle: ProducerHandle) {
        match handle.thread.join() {
            Ok(Some(mut sink)) => sink.close(),
            Ok(None) => {}
            Err(_) => error!("producer thread terminated abnormally"),
        }
    }

    // --- Parameters ---

    /// Set the oscillator frequency. NaN, infinite and negative values are
    /// ignored; range checks against the audible band are the caller's job.
    pub fn set_frequency(&self, channel: impl Into<ChannelSelect>, hz: f32) -> Result<(), EngineError> {
        self.ensure_live()?;
        if !self.params.set_frequency(channel.into(), hz) {
            warn!("ignoring invalid frequency {}", hz);
            return Ok(());
        }
        self.notify();
        Ok(())
    }

    /// Set the output level, clamped to `[0, MAX_VOLUME]`.
    pub fn set_volume(&self, channel: impl Into<ChannelSelect>, level: f32) -> Result<(), EngineError> {
        self.ensure_live()?;
        let stored = self.params.set_volume(channel.into(), level);
        if stored != level {
            debug!("volume {} clamped to {}", level, stored);
        }
        self.notify();
        Ok(())
    }

    /// Set the waveform on both channels.
    pub fn set_waveform(&self, kind: WaveformKind) -> Result<(), EngineError> {
        self.set_channel_waveform(ChannelSelect::Both, kind)
    }

    pub fn set_channel_waveform(
        &self,
        channel: impl Into<ChannelSelect>,
        kind: WaveformKind,
    ) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.params.set_waveform(channel.into(), kind);
        self.notify();
        Ok(())
    }

    /// Same tone in both ears.
    pub fn apply_frequency(&self, hz: f32) -> Result<(), EngineError> {
        self.set_frequency(ChannelSelect::Both, hz)
    }

    /// Independent tones per ear; the beat is their difference.
    pub fn set_binaural_beat(&self, left_hz: f32, right_hz: f32) -> Result<(), EngineError> {
        self.ensure_live()?;
        let left = self.params.set_frequency(ChannelSelect::Left, left_hz);
        let right = self.params.set_frequency(ChannelSelect::Right, right_hz);
        if !(left && right) {
            warn!("ignoring invalid binaural pair {} / {}", left_hz, right_hz);
        }
        if left || right {
            self.notify();
        }
        Ok(())
    }

    pub fn frequency(&self, channel: Channel) -> f32 {
        self.params.channel(channel).frequency()
    }

    pub fn volume(&self, channel: Channel) -> f32 {
        self.params.channel(channel).volume()
    }

    pub fn waveform(&self, channel: Channel) -> WaveformKind {
        self.params.channel(channel).waveform()
    }

    pub fn settings(&self) -> ToneSettings {
        self.params.settings()
    }

    pub fn beat_frequency(&self) -> f32 {
        self.settings().beat_hz()
    }

    /// Called with the new settings after every accepted parameter change.
    pub fn set_listener(&mut self, listener: impl Fn(&ToneSettings) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.state.load() == EngineState::Released {
            return Err(EngineError::Released);
        }
        Ok(())
    }

    fn notify(&self) {
        if let Some(listener) = &self.listener {
            listener(&self.params.settings());
        }
    }

    // --- Offline rendering ---

    /// Render `count` frames of the current settings without a device.
    pub fn render_frames(&self, count: usize) -> Vec<StereoFrame> {
        let mut renderer = BlockRenderer::new(self.config.sample_rate, self.config.block_size);
        renderer.render_frames(&self.params, count)
    }

    /// Encode `seconds` of the current settings as an in-memory WAV file.
    pub fn render_to_wav(&self, seconds: f32) -> Result<Vec<u8>, EngineError> {
        let count = self.frames_for(seconds)?;
        let mut out = Vec::with_capacity(44 + count * 4);
        self.write_frames_as_wav(&mut out, count)?;
        Ok(out)
    }

    /// Stream `seconds` of the current settings to `w` as a WAV file,
    /// one block at a time.
    pub fn write_wav_to(&self, w: &mut impl Write, seconds: f32) -> Result<(), EngineError> {
        let count = self.frames_for(seconds)?;
        self.write_frames_as_wav(w, count)
    }

    fn frames_for(&self, seconds: f32) -> Result<usize, EngineError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EngineError::InvalidDuration(seconds));
        }
        let count = (self.config.sample_rate as f64 * seconds as f64) as u64;
        if count > MAX_WAV_FRAMES as u64 {
            return Err(EngineError::InvalidDuration(seconds));
        }
        Ok(count as usize)
    }

    fn write_frames_as_wav(&self, w: &mut impl Write, count: usize) -> Result<(), EngineError> {
        let sample_rate = self.config.sample_rate;
        wav::write_header(w, count, sample_rate)?;

        let mut renderer = BlockRenderer::new(sample_rate, self.config.block_size);
        let mut block = vec![StereoFrame::silence(); self.config.block_size.min(count)];
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(block.len());
            renderer.render_into(&self.params, &mut block[..n]);
            wav::write_frames(w, &block[..n])?;
            remaining -= n;
        }
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
