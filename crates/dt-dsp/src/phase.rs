//! Continuous-phase accumulator.
//!
//! One accumulator per channel. Frequency changes take effect on the next
//! step with no ramp: the phase itself never jumps, only its rate.

use core::f64::consts::TAU;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseAccumulator {
    /// Current angle in radians, always in `[0, 2π)`.
    phase: f64,
    sample_rate: u32,
}

impl PhaseAccumulator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
        }
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Radians advanced per sample at `frequency_hz`.
    #[inline]
    pub fn step_for(&self, frequency_hz: f32) -> f64 {
        TAU * frequency_hz as f64 / self.sample_rate as f64
    }

    /// Advance by one sample at `frequency_hz`.
    ///
    /// A non-finite step (NaN/infinite frequency, zero sample rate) leaves
    /// the phase unchanged.
    #[inline]
    pub fn advance(&mut self, frequency_hz: f32) {
        let step = self.step_for(frequency_hz);
        if !step.is_finite() {
            return;
        }
        self.phase = wrap(self.phase + step);
    }
}

/// Normalise an angle into `[0, 2π)`.
#[inline]
pub fn wrap(angle: f64) -> f64 {
    let mut p = angle % TAU;
    if p < 0.0 {
        p += TAU;
    }
    // `-tiny + TAU` can round up to exactly TAU
    if p >= TAU {
        p = 0.0;
    }
    p
}
