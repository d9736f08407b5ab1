//! Stereo frame and block types.

use alloc::vec;
use alloc::vec::Vec;

/// One stereo sample pair, each side in `[-1, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const fn silence() -> Self {
        Self {
            left: 0.0,
            right: 0.0,
        }
    }

    /// Build a frame, clamping both sides into `[-1, 1]`.
    #[inline]
    pub fn clamped(left: f32, right: f32) -> Self {
        Self {
            left: left.clamp(-1.0, 1.0),
            right: right.clamp(-1.0, 1.0),
        }
    }

    /// Convert to 16-bit PCM.
    #[inline]
    pub fn to_i16(self) -> (i16, i16) {
        (to_i16(self.left), to_i16(self.right))
    }
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// A fixed-size batch of frames generated and written together.
///
/// A new block is built for every iteration of the producer and moved
/// into the sink on write.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    frames: Vec<StereoFrame>,
}

impl AudioBlock {
    /// A silent block of `len` frames.
    pub fn silent(len: usize) -> Self {
        Self {
            frames: vec![StereoFrame::silence(); len],
        }
    }

    pub fn from_frames(frames: Vec<StereoFrame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[StereoFrame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [StereoFrame] {
        &mut self.frames
    }

    pub fn into_frames(self) -> Vec<StereoFrame> {
        self.frames
    }
}
