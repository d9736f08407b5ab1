//! Audio sink traits and error types.

use dt_dsp::AudioBlock;
use std::time::Duration;

/// Error type for sink operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SinkError {
    /// No usable output device, or the device refused the stream.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The device has no stream configuration we can drive.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
    /// The device failed while a block was being written.
    #[error("write failed: {0}")]
    WriteFailure(String),
    /// The device stopped consuming frames.
    #[error("device stalled for {0:?}")]
    Stalled(Duration),
    /// Write attempted after `close()`.
    #[error("sink is closed")]
    Closed,
}

/// An open audio output.
///
/// Owned by exactly one thread at a time. `close()` is only ever called
/// after the last `write()` has returned.
pub trait AudioSink: Send {
    /// Sample rate the sink was opened with.
    fn sample_rate(&self) -> u32;

    /// Hand a block to the output, blocking while the device buffer is full.
    fn write(&mut self, block: AudioBlock) -> Result<(), SinkError>;

    /// Release the device. Idempotent.
    fn close(&mut self);
}

/// Opens sinks on demand; one sink per start of the engine.
pub trait SinkOpener: Send {
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioSink>, SinkError>;
}

impl<F> SinkOpener for F
where
    F: FnMut(u32, u16) -> Result<Box<dyn AudioSink>, SinkError> + Send,
{
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioSink>, SinkError> {
        self(sample_rate, channels)
    }
}
