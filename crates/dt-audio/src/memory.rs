//! In-memory sink.
//!
//! Records every frame written plus an ordered event log. Useful for
//! offline capture and for checking the write/close ordering contract.

use dt_dsp::{AudioBlock, StereoFrame};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::traits::{AudioSink, SinkError, SinkOpener};

/// Something that happened to a memory sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Opened { sample_rate: u32, channels: u16 },
    Wrote { frames: usize },
    Closed,
    /// `close()` ran while a `write()` was still in flight.
    CloseDuringWrite,
    /// Two writes were in flight at the same time.
    OverlappingWrite,
    /// `write()` was called on a closed sink.
    WriteAfterClose,
}

impl SinkEvent {
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            SinkEvent::CloseDuringWrite | SinkEvent::OverlappingWrite | SinkEvent::WriteAfterClose
        )
    }
}

#[derive(Default)]
struct CaptureState {
    frames: Vec<StereoFrame>,
    events: Vec<SinkEvent>,
}

#[derive(Default)]
struct CaptureInner {
    state: Mutex<CaptureState>,
    writes_in_flight: AtomicUsize,
}

/// Shared view of everything written through sinks from one opener.
#[derive(Clone, Default)]
pub struct Capture {
    inner: Arc<CaptureInner>,
}

impl Capture {
    fn state(&self) -> MutexGuard<'_, CaptureState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: SinkEvent) {
        self.state().events.push(event);
    }

    /// All frames written so far, in order.
    pub fn frames(&self) -> Vec<StereoFrame> {
        self.state().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.state().frames.len()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.state().events.clone()
    }

    pub fn violations(&self) -> Vec<SinkEvent> {
        self.state()
            .events
            .iter()
            .filter(|e| e.is_violation())
            .cloned()
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Opened { .. }))
    }

    pub fn close_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Closed))
    }

    pub fn write_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Wrote { .. }))
    }

    fn count(&self, pred: impl Fn(&SinkEvent) -> bool) -> usize {
        self.state().events.iter().filter(|e| pred(e)).count()
    }
}

/// Opens [`MemorySink`]s that all report into one [`Capture`].
#[derive(Clone, Default)]
pub struct MemoryOpener {
    capture: Capture,
    write_delay: Duration,
    fail_after: Option<usize>,
    fail_open: bool,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every write, standing in for device backpressure.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Make each opened sink fail every write after the first `writes`.
    pub fn failing_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }

    /// Make `open()` fail with `DeviceUnavailable`.
    pub fn unavailable(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn capture(&self) -> Capture {
        self.capture.clone()
    }
}

impl SinkOpener for MemoryOpener {
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioSink>, SinkError> {
        if self.fail_open {
            return Err(SinkError::DeviceUnavailable("memory sink set unavailable".to_string()));
        }
        self.capture.record(SinkEvent::Opened {
            sample_rate,
            channels,
        });
        Ok(Box::new(MemorySink {
            sample_rate,
            capture: self.capture.clone(),
            write_delay: self.write_delay,
            writes_left: self.fail_after,
            writing: Arc::new(AtomicBool::new(false)),
            closed: false,
        }))
    }
}

/// Sink that appends frames to a [`Capture`].
pub struct MemorySink {
    sample_rate: u32,
    capture: Capture,
    write_delay: Duration,
    writes_left: Option<usize>,
    writing: Arc<AtomicBool>,
    closed: bool,
}

impl AudioSink for MemorySink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: AudioBlock) -> Result<(), SinkError> {
        if self.closed {
            self.capture.record(SinkEvent::WriteAfterClose);
            return Err(SinkError::Closed);
        }
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(SinkError::WriteFailure("injected failure".to_string()));
            }
            *left -= 1;
        }

        let inflight = &self.capture.inner.writes_in_flight;
        if inflight.fetch_add(1, Ordering::AcqRel) > 0 {
            self.capture.record(SinkEvent::OverlappingWrite);
        }
        self.writing.store(true, Ordering::Release);

        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
        {
            let mut state = self.capture.state();
            state.events.push(SinkEvent::Wrote {
                frames: block.len(),
            });
            state.frames.extend_from_slice(block.frames());
        }

        self.writing.store(false, Ordering::Release);
        inflight.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.writing.load(Ordering::Acquire)
            || self.capture.inner.writes_in_flight.load(Ordering::Acquire) > 0
        {
            self.capture.record(SinkEvent::CloseDuringWrite);
        }
        self.closed = true;
        self.capture.record(SinkEvent::Closed);
    }
}
