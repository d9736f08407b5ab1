//! CPAL-based audio sink.
//!
//! Frames go through a lock-free ring buffer to the device callback. A full
//! ring makes `write()` wait, which paces the producer to the device clock.
//!
//! `cpal::Stream` is not `Send`, so each sink parks its stream on a small
//! keeper thread and drops it there on `close()`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SizedSample, Stream, StreamConfig};
use dt_dsp::{AudioBlock, StereoFrame};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::traits::{AudioSink, SinkError, SinkOpener};

/// Longest a write will wait for the device to drain before giving up.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval while the ring is full.
const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Opens sinks on the default output device of the default host.
#[derive(Clone, Debug)]
pub struct CpalOpener {
    buffer_ms: u32,
}

impl CpalOpener {
    pub fn new() -> Self {
        Self { buffer_ms: 100 }
    }

    /// Ring buffer length in milliseconds of audio.
    pub fn with_buffer_ms(mut self, buffer_ms: u32) -> Self {
        self.buffer_ms = buffer_ms.max(1);
        self
    }
}

impl Default for CpalOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkOpener for CpalOpener {
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioSink>, SinkError> {
        let sink = CpalSink::open(sample_rate, channels, self.buffer_ms)?;
        Ok(Box::new(sink))
    }
}

/// State shared between the writer, the device callback and the error callback.
struct Shared {
    lock: Mutex<()>,
    space: Condvar,
    failed: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            space: Condvar::new(),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    fn report(&self, err: cpal::StreamError) {
        error!("Audio stream error: {}", err);
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            if let Ok(mut slot) = self.failure.lock() {
                *slot = Some(err.to_string());
            }
            self.failed.store(true, Ordering::Release);
            self.space.notify_all();
        }
    }

    fn failure(&self) -> Option<String> {
        if !self.failed.load(Ordering::Acquire) {
            return None;
        }
        let message = self
            .failure
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| "device failed".to_string());
        Some(message)
    }

    fn wait_for_space(&self, timeout: Duration) {
        let guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self.space.wait_timeout(guard, timeout);
    }
}

/// A live output stream on the default device.
pub struct CpalSink {
    sample_rate: u32,
    producer: HeapProd<StereoFrame>,
    shared: Arc<Shared>,
    close_tx: Option<mpsc::Sender<()>>,
    keeper: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the default output device and start the stream.
    ///
    /// Runs at `sample_rate` when the device supports it, otherwise at the
    /// device's own default rate. [`AudioSink::sample_rate`] reports the
    /// rate actually in use.
    pub fn open(sample_rate: u32, channels: u16, buffer_ms: u32) -> Result<Self, SinkError> {
        let shared = Arc::new(Shared::new());
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<Opened, SinkError>>(1);
        let (close_tx, close_rx) = mpsc::channel::<()>();

        let stream_shared = shared.clone();
        let keeper = thread::Builder::new()
            .name("dt-cpal-stream".into())
            .spawn(move || {
                let (stream, opened) =
                    match start_stream(sample_rate, channels, buffer_ms, stream_shared) {
                        Ok(started) => started,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                let _ = ready_tx.send(Ok(opened));

                // Returns on close() or when the sink is dropped
                let _ = close_rx.recv();
                if let Err(e) = stream.pause() {
                    debug!("pause on close failed: {}", e);
                }
                drop(stream);
            })
            .map_err(|e| SinkError::DeviceUnavailable(e.to_string()))?;

        let opened = match ready_rx.recv() {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                let _ = keeper.join();
                return Err(e);
            }
            Err(_) => {
                let _ = keeper.join();
                return Err(SinkError::DeviceUnavailable(
                    "stream thread exited during setup".to_string(),
                ));
            }
        };

        if opened.sample_rate != sample_rate {
            info!(
                "device does not support {} Hz, running at {} Hz",
                sample_rate, opened.sample_rate
            );
        }

        Ok(Self {
            sample_rate: opened.sample_rate,
            producer: opened.producer,
            shared,
            close_tx: Some(close_tx),
            keeper: Some(keeper),
        })
    }

    fn is_closed(&self) -> bool {
        self.close_tx.is_none()
    }
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: AudioBlock) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }

        let frames = block.frames();
        let mut written = 0;
        let mut last_progress = Instant::now();

        while written < frames.len() {
            if let Some(message) = self.shared.failure() {
                return Err(SinkError::WriteFailure(message));
            }

            let pushed = self.producer.push_slice(&frames[written..]);
            if pushed > 0 {
                written += pushed;
                last_progress = Instant::now();
                continue;
            }

            if last_progress.elapsed() >= STALL_TIMEOUT {
                warn!("cpal sink stalled with {} frames pending", frames.len() - written);
                return Err(SinkError::Stalled(STALL_TIMEOUT));
            }
            self.shared.wait_for_space(WAIT_SLICE);
        }
        Ok(())
    }

    fn close(&mut self) {
        let Some(close_tx) = self.close_tx.take() else {
            return;
        };
        let _ = close_tx.send(());
        if let Some(keeper) = self.keeper.take() {
            let _ = keeper.join();
        }
        debug!("cpal sink closed");
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// What the keeper thread hands back once the stream is playing.
struct Opened {
    sample_rate: u32,
    producer: HeapProd<StereoFrame>,
}

/// One supported output range, reduced to what rate selection needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RateRange {
    channels: u16,
    min: u32,
    max: u32,
}

/// The requested rate if some range with our channel count covers it,
/// else the device default.
fn choose_sample_rate(requested: u32, channels: u16, ranges: &[RateRange], device_default: u32) -> u32 {
    let covered = ranges
        .iter()
        .any(|r| r.channels == channels && (r.min..=r.max).contains(&requested));
    if covered {
        requested
    } else {
        device_default
    }
}

fn ring_capacity(sample_rate: u32, buffer_ms: u32) -> usize {
    ((sample_rate as u64 * buffer_ms as u64) / 1000).max(1) as usize
}

fn start_stream(
    requested_rate: u32,
    channels: u16,
    buffer_ms: u32,
    shared: Arc<Shared>,
) -> Result<(Stream, Opened), SinkError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SinkError::DeviceUnavailable("no output device".to_string()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| SinkError::DeviceUnavailable(e.to_string()))?;
    let format = supported.sample_format();

    let ranges: Vec<RateRange> = device
        .supported_output_configs()
        .map(|configs| {
            configs
                .filter(|c| c.sample_format() == format)
                .map(|c| RateRange {
                    channels: c.channels(),
                    min: c.min_sample_rate().0,
                    max: c.max_sample_rate().0,
                })
                .collect()
        })
        .unwrap_or_else(|e| {
            warn!("could not list output configs: {}", e);
            Vec::new()
        });
    let sample_rate = choose_sample_rate(requested_rate, channels, &ranges, supported.sample_rate().0);

    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let capacity = ring_capacity(sample_rate, buffer_ms);
    let (producer, consumer) = HeapRb::<StereoFrame>::new(capacity).split();

    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, shared)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, shared)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, shared)?,
        other => return Err(SinkError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream
        .play()
        .map_err(|e| SinkError::DeviceUnavailable(e.to_string()))?;
    debug!(
        "cpal stream playing at {} Hz, {} channels, {} frame ring",
        sample_rate, channels, capacity
    );
    Ok((
        stream,
        Opened {
            sample_rate,
            producer,
        },
    ))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<StereoFrame>,
    shared: Arc<Shared>,
) -> Result<Stream, SinkError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_shared = shared.clone();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // One ring frame per device frame; underrun plays silence
                for chunk in data.chunks_mut(channels) {
                    let frame = consumer.try_pop().unwrap_or_default();
                    for (i, sample) in chunk.iter_mut().enumerate() {
                        *sample = match i {
                            0 => T::from_sample(frame.left),
                            1 => T::from_sample(frame.right),
                            _ => T::EQUILIBRIUM,
                        };
                    }
                }
                shared.space.notify_one();
            },
            move |err| err_shared.report(err),
            None,
        )
        .map_err(|e| SinkError::DeviceUnavailable(e.to_string()))
}
