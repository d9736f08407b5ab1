//! Waveform shapes evaluated at a phase angle.

use core::f64::consts::{PI, TAU};
use core::fmt;
use core::str::FromStr;

/// Oscillator shape. Applied per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WaveformKind {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl WaveformKind {
    pub const ALL: [WaveformKind; 4] = [
        WaveformKind::Sine,
        WaveformKind::Square,
        WaveformKind::Sawtooth,
        WaveformKind::Triangle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WaveformKind::Sine => "sine",
            WaveformKind::Square => "square",
            WaveformKind::Sawtooth => "sawtooth",
            WaveformKind::Triangle => "triangle",
        }
    }

    /// Compact encoding for atomic storage.
    pub(crate) const fn to_u8(self) -> u8 {
        match self {
            WaveformKind::Sine => 0,
            WaveformKind::Square => 1,
            WaveformKind::Sawtooth => 2,
            WaveformKind::Triangle => 3,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => WaveformKind::Square,
            2 => WaveformKind::Sawtooth,
            3 => WaveformKind::Triangle,
            _ => WaveformKind::Sine,
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a waveform name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseWaveformError;

impl fmt::Display for ParseWaveformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown waveform (expected sine, square, sawtooth or triangle)")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseWaveformError {}

impl FromStr for WaveformKind {
    type Err = ParseWaveformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const SHORT: [(&str, WaveformKind); 4] = [
            ("sin", WaveformKind::Sine),
            ("sqr", WaveformKind::Square),
            ("saw", WaveformKind::Sawtooth),
            ("tri", WaveformKind::Triangle),
        ];
        let s = s.trim();
        WaveformKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .or_else(|| {
                SHORT
                    .into_iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(s))
                    .map(|(_, kind)| kind)
            })
            .ok_or(ParseWaveformError)
    }
}

/// Evaluate `kind` at `phase` (radians, expected in `[0, 2π)`).
///
/// Pure: no state, no allocation. The result is in `[-1, 1]`.
#[inline]
pub fn sample(phase: f64, kind: WaveformKind) -> f32 {
    let value = match kind {
        WaveformKind::Sine => libm::sin(phase),
        WaveformKind::Square => {
            if phase < PI {
                1.0
            } else {
                -1.0
            }
        }
        WaveformKind::Sawtooth => 2.0 * (phase / TAU) - 1.0,
        WaveformKind::Triangle => {
            let t = phase / TAU;
            if t < 0.5 {
                4.0 * t - 1.0
            } else {
                -4.0 * t + 3.0
            }
        }
    };
    value as f32
}
