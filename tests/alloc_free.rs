//! Allocation-free render path tests.
//!
//! These tests verify that `BlockRenderer::render_into()` does not allocate,
//! for every waveform and with parameters changing between blocks, so the
//! producer loop only allocates the block it hands to the sink.
//!
//! Just run `cargo test`, no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use dt_dsp::{BlockRenderer, ChannelSelect, StereoFrame, ToneParams, ToneSettings, WaveformKind};

const SAMPLE_RATE: u32 = 44100;
const BLOCK: usize = 1024;

/// Render `duration_frames` in blocks, aborting on any heap allocation.
fn assert_render_alloc_free(params: &ToneParams, duration_frames: usize) {
    let mut renderer = BlockRenderer::new(SAMPLE_RATE, BLOCK);
    let mut out = vec![StereoFrame::silence(); BLOCK];

    assert_no_alloc(|| {
        for _ in 0..duration_frames / BLOCK {
            renderer.render_into(params, &mut out);
        }
    });
}

fn params(waveform: WaveformKind) -> ToneParams {
    ToneParams::from_settings(&ToneSettings {
        left_hz: 440.0,
        right_hz: 445.0,
        waveform,
        ..ToneSettings::default()
    })
}

#[test]
fn sine_alloc_free() {
    assert_render_alloc_free(&params(WaveformKind::Sine), SAMPLE_RATE as usize * 5);
}

#[test]
fn square_alloc_free() {
    assert_render_alloc_free(&params(WaveformKind::Square), SAMPLE_RATE as usize * 5);
}

#[test]
fn sawtooth_alloc_free() {
    assert_render_alloc_free(&params(WaveformKind::Sawtooth), SAMPLE_RATE as usize * 5);
}

#[test]
fn triangle_alloc_free() {
    assert_render_alloc_free(&params(WaveformKind::Triangle), SAMPLE_RATE as usize * 5);
}

#[test]
fn parameter_writes_alloc_free() {
    let params = params(WaveformKind::Sine);
    let mut renderer = BlockRenderer::new(SAMPLE_RATE, BLOCK);
    let mut out = vec![StereoFrame::silence(); BLOCK];

    assert_no_alloc(|| {
        for i in 0..200 {
            params.set_frequency(ChannelSelect::Left, 100.0 + i as f32);
            params.set_volume(ChannelSelect::Right, 0.001 * i as f32);
            params.set_waveform(ChannelSelect::Both, WaveformKind::ALL[i % 4]);
            renderer.render_into(&params, &mut out);
        }
    });
}
