//! Producer thread: renders blocks and pushes them into the sink.

use dt_audio::AudioSink;
use dt_dsp::{BlockRenderer, ToneParams};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProducerFault;
use crate::state::{AtomicEngineState, EngineState};

/// Everything the producer shares with the controller.
pub(crate) struct ProducerShared {
    pub params: Arc<ToneParams>,
    pub state: Arc<AtomicEngineState>,
    pub fault: Arc<Mutex<Option<ProducerFault>>>,
}

impl ProducerShared {
    fn record_fault(&self, fault: ProducerFault) {
        let mut slot = self.fault.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(fault);
    }
}

/// What the producer thread returns: the sink, unless it faulted.
pub(crate) type ProducerExit = Option<Box<dyn AudioSink>>;

/// Thread body handed to the spawner.
pub(crate) type ProducerBody = Box<dyn FnOnce() -> ProducerExit + Send>;

/// Spawn the producer through `spawn` and hand it the sink.
///
/// The sink only moves to the new thread once the spawn has succeeded, so
/// a failed spawn closes it here instead of dropping it unclosed.
pub(crate) fn launch(
    mut sink: Box<dyn AudioSink>,
    renderer: BlockRenderer,
    shared: ProducerShared,
    spawn: impl FnOnce(ProducerBody) -> io::Result<JoinHandle<ProducerExit>>,
) -> io::Result<JoinHandle<ProducerExit>> {
    let (handoff, inbox) = mpsc::sync_channel::<Box<dyn AudioSink>>(1);
    let body: ProducerBody = Box::new(move || match inbox.recv() {
        Ok(sink) => producer_thread(sink, renderer, shared),
        Err(_) => {
            shared.state.transition(EngineState::Running, EngineState::Stopped);
            None
        }
    });

    match spawn(body) {
        Ok(handle) => {
            if let Err(mpsc::SendError(mut sink)) = handoff.send(sink) {
                warn!("producer exited before receiving its sink");
                sink.close();
            }
            Ok(handle)
        }
        Err(e) => {
            sink.close();
            Err(e)
        }
    }
}

/// Thread entry point.
///
/// Returns the sink when the loop exited because the controller asked it
/// to, so the controller can close it after joining. Returns `None` when the
/// producer faulted; the sink is already closed (or lost to the panic).
pub(crate) fn producer_thread(
    sink: Box<dyn AudioSink>,
    renderer: BlockRenderer,
    shared: ProducerShared,
) -> ProducerExit {
    let result = panic::catch_unwind(AssertUnwindSafe(|| run(sink, renderer, &shared)));
    match result {
        Ok(sink) => sink,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("producer panicked: {}", message);
            shared.record_fault(ProducerFault::Panic(message));
            shared.state.transition(EngineState::Running, EngineState::Stopped);
            None
        }
    }
}

fn run(
    mut sink: Box<dyn AudioSink>,
    mut renderer: BlockRenderer,
    shared: &ProducerShared,
) -> ProducerExit {
    let mut blocks: u64 = 0;
    loop {
        let block = renderer.next_block(&shared.params);

        // Never write once the controller has started tearing down
        if shared.state.load() != EngineState::Running {
            debug!("producer exiting after {} blocks", blocks);
            return Some(sink);
        }

        if let Err(e) = sink.write(block) {
            warn!("sink write failed after {} blocks: {}", blocks, e);
            shared.record_fault(ProducerFault::Write(e));
            sink.close();
            shared.state.transition(EngineState::Running, EngineState::Stopped);
            return None;
        }
        blocks += 1;
    }
}
