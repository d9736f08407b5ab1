//! Oscillator parameters shared between the control thread and the renderer.
//!
//! Every field is its own atomic, so a writer never blocks the render loop.
//! Fields are independent: a block may observe a new volume together with
//! an old frequency.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::channel::{Channel, ChannelSelect};
use crate::waveform::WaveformKind;

/// Volume ceiling. Hearing-safety limit, applied on every assignment.
pub const MAX_VOLUME: f32 = 0.3;

/// Clamp a requested level into `[0, MAX_VOLUME]`. NaN maps to silence.
#[inline]
pub fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, MAX_VOLUME)
    }
}

/// Frequencies the parameter block will store: finite and non-negative.
/// Range checks against the audible band belong to the caller.
#[inline]
pub fn is_storable_frequency(hz: f32) -> bool {
    hz.is_finite() && hz >= 0.0
}

/// Lock-free `f32` cell.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Plain copy of one channel's parameters, taken once per block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OscillatorSnapshot {
    pub frequency_hz: f32,
    pub volume: f32,
    pub waveform: WaveformKind,
}

/// Live parameters for one channel.
#[derive(Debug)]
pub struct ChannelParams {
    frequency_hz: AtomicF32,
    volume: AtomicF32,
    waveform: AtomicU8,
}

impl ChannelParams {
    pub fn new(frequency_hz: f32, volume: f32, waveform: WaveformKind) -> Self {
        let frequency_hz = if is_storable_frequency(frequency_hz) {
            frequency_hz
        } else {
            0.0
        };
        Self {
            frequency_hz: AtomicF32::new(frequency_hz),
            volume: AtomicF32::new(clamp_volume(volume)),
            waveform: AtomicU8::new(waveform.to_u8()),
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz.load()
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub fn waveform(&self) -> WaveformKind {
        WaveformKind::from_u8(self.waveform.load(Ordering::Relaxed))
    }

    /// Store `hz` verbatim. Returns `false` (and keeps the old value) for
    /// NaN, infinite or negative input.
    pub fn set_frequency(&self, hz: f32) -> bool {
        if !is_storable_frequency(hz) {
            return false;
        }
        self.frequency_hz.store(hz);
        true
    }

    /// Store the clamped level and return what was stored.
    pub fn set_volume(&self, level: f32) -> f32 {
        let clamped = clamp_volume(level);
        self.volume.store(clamped);
        clamped
    }

    pub fn set_waveform(&self, kind: WaveformKind) {
        self.waveform.store(kind.to_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub fn snapshot(&self) -> OscillatorSnapshot {
        OscillatorSnapshot {
            frequency_hz: self.frequency(),
            volume: self.volume(),
            waveform: self.waveform(),
        }
    }
}

/// Initial or current values for both channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneSettings {
    pub left_hz: f32,
    pub right_hz: f32,
    pub left_volume: f32,
    pub right_volume: f32,
    pub waveform: WaveformKind,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            left_hz: 440.0,
            right_hz: 440.0,
            left_volume: 0.1,
            right_volume: 0.1,
            waveform: WaveformKind::Sine,
        }
    }
}

impl ToneSettings {
    /// Frequency difference between the ears.
    pub fn beat_hz(&self) -> f32 {
        libm::fabsf(self.left_hz - self.right_hz)
    }
}

/// Parameters for the left and right oscillators.
#[derive(Debug)]
pub struct ToneParams {
    left: ChannelParams,
    right: ChannelParams,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self::from_settings(&ToneSettings::default())
    }
}

impl ToneParams {
    pub fn from_settings(settings: &ToneSettings) -> Self {
        Self {
            left: ChannelParams::new(settings.left_hz, settings.left_volume, settings.waveform),
            right: ChannelParams::new(settings.right_hz, settings.right_volume, settings.waveform),
        }
    }

    #[inline]
    pub fn channel(&self, channel: Channel) -> &ChannelParams {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    /// Returns `false` if `hz` was rejected; nothing is written in that case.
    pub fn set_frequency(&self, select: ChannelSelect, hz: f32) -> bool {
        if !is_storable_frequency(hz) {
            return false;
        }
        for &ch in select.channels() {
            self.channel(ch).set_frequency(hz);
        }
        true
    }

    pub fn set_volume(&self, select: ChannelSelect, level: f32) -> f32 {
        let clamped = clamp_volume(level);
        for &ch in select.channels() {
            self.channel(ch).set_volume(clamped);
        }
        clamped
    }

    pub fn set_waveform(&self, select: ChannelSelect, kind: WaveformKind) {
        for &ch in select.channels() {
            self.channel(ch).set_waveform(kind);
        }
    }

    /// Current values. The left channel's waveform stands for both.
    pub fn settings(&self) -> ToneSettings {
        ToneSettings {
            left_hz: self.left.frequency(),
            right_hz: self.right.frequency(),
            left_volume: self.left.volume(),
            right_volume: self.right.volume(),
            waveform: self.left.waveform(),
        }
    }
}
