//! Oscillators and stereo block rendering for duotone.
//!
//! Turns per-channel (frequency, volume, waveform) parameters into a
//! continuous stream of stereo frames. Parameters live in atomics so a
//! control thread can change them while a render thread is producing.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod frame;
mod params;
mod phase;
mod render;
pub mod waveform;

pub use channel::{Channel, ChannelSelect};
pub use frame::{AudioBlock, StereoFrame};
pub use params::{
    clamp_volume, is_storable_frequency, ChannelParams, OscillatorSnapshot, ToneParams,
    ToneSettings, MAX_VOLUME,
};
pub use phase::PhaseAccumulator;
pub use render::{BlockRenderer, CHANNELS, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};
pub use waveform::{ParseWaveformError, WaveformKind};
