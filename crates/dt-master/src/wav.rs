//! WAV encoding for 16-bit stereo PCM.
//!
//! The header carries the final sizes, so callers announce the frame count
//! up front and may then stream frames in any number of chunks.

use dt_dsp::StereoFrame;
use std::io::{self, Write};

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const FRAME_BYTES: u32 = CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8);
const HEADER_BYTES: u32 = 44;

/// Most frames a single RIFF file can describe.
pub const MAX_WAV_FRAMES: usize = ((u32::MAX - (HEADER_BYTES - 8)) / FRAME_BYTES) as usize;

/// Header sizes, checked against the 32-bit RIFF fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Layout {
    riff_size: u32,
    byte_rate: u32,
    data_size: u32,
}

impl Layout {
    fn new(frame_count: usize, sample_rate: u32) -> io::Result<Self> {
        let data_size = u32::try_from(frame_count)
            .ok()
            .and_then(|n| n.checked_mul(FRAME_BYTES))
            .ok_or_else(|| invalid(format!("{} frames do not fit in a WAV file", frame_count)))?;
        let riff_size = data_size
            .checked_add(HEADER_BYTES - 8)
            .ok_or_else(|| invalid(format!("{} frames do not fit in a WAV file", frame_count)))?;
        let byte_rate = sample_rate
            .checked_mul(FRAME_BYTES)
            .ok_or_else(|| invalid(format!("sample rate {} Hz is too high for WAV", sample_rate)))?;
        Ok(Self {
            riff_size,
            byte_rate,
            data_size,
        })
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

/// Write a complete file holding `frames`.
pub fn write_wav(w: &mut impl Write, frames: &[StereoFrame], sample_rate: u32) -> io::Result<()> {
    write_header(w, frames.len(), sample_rate)?;
    write_frames(w, frames)
}

/// Encode `frames` into an in-memory file.
pub fn frames_to_wav(frames: &[StereoFrame], sample_rate: u32) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_BYTES as usize + frames.len() * FRAME_BYTES as usize);
    write_wav(&mut buf, frames, sample_rate)?;
    Ok(buf)
}

/// RIFF, fmt and data chunk headers for `frame_count` frames to follow.
///
/// Fails with `InvalidInput` when a size does not fit its 32-bit field.
pub(crate) fn write_header(w: &mut impl Write, frame_count: usize, sample_rate: u32) -> io::Result<()> {
    let layout = Layout::new(frame_count, sample_rate)?;

    w.write_all(b"RIFF")?;
    w.write_all(&layout.riff_size.to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&CHANNELS.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&layout.byte_rate.to_le_bytes())?;
    w.write_all(&(FRAME_BYTES as u16).to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&layout.data_size.to_le_bytes())
}

/// Interleaved little-endian samples, left first.
pub(crate) fn write_frames(w: &mut impl Write, frames: &[StereoFrame]) -> io::Result<()> {
    let mut bytes = [0u8; FRAME_BYTES as usize];
    for frame in frames {
        let (left, right) = frame.to_i16();
        bytes[..2].copy_from_slice(&left.to_le_bytes());
        bytes[2..].copy_from_slice(&right.to_le_bytes());
        w.write_all(&bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn header_describes_stereo_16_bit() {
        let frames = vec![StereoFrame::silence(); 10];
        let wav = frames_to_wav(&frames, 44100).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + 40);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32_at(&wav, 24), 44100);
        assert_eq!(u32_at(&wav, 28), 44100 * 4);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 40);
        assert_eq!(wav.len(), 44 + 40);
    }

    #[test]
    fn samples_are_interleaved_left_right() {
        let frames = [StereoFrame { left: 1.0, right: -1.0 }];
        let wav = frames_to_wav(&frames, 48000).unwrap();
        let left = i16::from_le_bytes([wav[44], wav[45]]);
        let right = i16::from_le_bytes([wav[46], wav[47]]);
        assert_eq!(left, 32767);
        assert_eq!(right, -32767);
    }

    #[test]
    fn chunked_frames_match_one_shot() {
        let frames: Vec<StereoFrame> = (0..100)
            .map(|i| StereoFrame { left: i as f32 / 100.0, right: -(i as f32) / 100.0 })
            .collect();
        let mut chunked = Vec::new();
        write_header(&mut chunked, frames.len(), 22050).unwrap();
        for chunk in frames.chunks(7) {
            write_frames(&mut chunked, chunk).unwrap();
        }
        assert_eq!(chunked, frames_to_wav(&frames, 22050).unwrap());
    }

    #[test]
    fn oversized_sample_rate_is_rejected() {
        let err = frames_to_wav(&[], 2_000_000_000).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn oversized_frame_count_is_rejected() {
        let mut out = Vec::new();
        let err = write_header(&mut out, MAX_WAV_FRAMES + 1, 44100).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(out.is_empty());

        let err = write_header(&mut out, usize::MAX, 44100).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn largest_frame_count_fits() {
        let mut out = Vec::new();
        write_header(&mut out, MAX_WAV_FRAMES, 44100).unwrap();
        assert_eq!(out.len(), 44);
        assert!(u32_at(&out, 4) >= u32_at(&out, 40));
    }
}
