//! Stereo block rendering.

use alloc::vec::Vec;

use crate::channel::Channel;
use crate::frame::{AudioBlock, StereoFrame};
use crate::params::{OscillatorSnapshot, ToneParams};
use crate::phase::PhaseAccumulator;
use crate::waveform;

/// Default output sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of frames per block.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Output channel count. Always stereo.
pub const CHANNELS: u16 = 2;

/// Fills stereo blocks from the shared parameters.
///
/// Owns the phase of both oscillators; parameters are read once at the
/// start of each block, so a change lands on the next block boundary.
#[derive(Clone, Debug)]
pub struct BlockRenderer {
    left: PhaseAccumulator,
    right: PhaseAccumulator,
    block_size: usize,
}

impl BlockRenderer {
    /// New renderer with both phases at zero.
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            left: PhaseAccumulator::new(sample_rate),
            right: PhaseAccumulator::new(sample_rate),
            block_size,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.left.sample_rate()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn phase(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Left => self.left.phase(),
            Channel::Right => self.right.phase(),
        }
    }

    /// Fill `out` with consecutive frames. Does not allocate.
    pub fn render_into(&mut self, params: &ToneParams, out: &mut [StereoFrame]) {
        let l = params.channel(Channel::Left).snapshot();
        let r = params.channel(Channel::Right).snapshot();

        for frame in out.iter_mut() {
            let left = voice(&self.left, &l);
            let right = voice(&self.right, &r);
            self.left.advance(l.frequency_hz);
            self.right.advance(r.frequency_hz);
            *frame = StereoFrame::clamped(left, right);
        }
    }

    /// Render one fresh block of `block_size` frames.
    pub fn next_block(&mut self, params: &ToneParams) -> AudioBlock {
        let mut block = AudioBlock::silent(self.block_size);
        self.render_into(params, block.frames_mut());
        block
    }

    /// Render `count` frames in block-sized steps, as the live loop would.
    pub fn render_frames(&mut self, params: &ToneParams, count: usize) -> Vec<StereoFrame> {
        let mut frames = alloc::vec![StereoFrame::silence(); count];
        let step = self.block_size.max(1);
        for chunk in frames.chunks_mut(step) {
            self.render_into(params, chunk);
        }
        frames
    }
}

#[inline]
fn voice(phase: &PhaseAccumulator, osc: &OscillatorSnapshot) -> f32 {
    waveform::sample(phase.phase(), osc.waveform) * osc.volume
}
