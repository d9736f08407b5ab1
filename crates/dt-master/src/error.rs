//! Controller error types.

use dt_audio::SinkError;

/// Errors returned across the controller API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The sink could not be opened; the engine stays stopped.
    #[error("audio device unavailable")]
    DeviceUnavailable(#[source] SinkError),
    /// The engine was released and cannot be used again.
    #[error("engine has been released")]
    Released,
    /// The producer thread could not be spawned.
    #[error("failed to spawn producer thread")]
    Spawn(#[source] std::io::Error),
    /// Offline render length that is negative, not finite, or too long for a WAV file.
    #[error("invalid render duration: {0} s")]
    InvalidDuration(f32),
    /// Encoding or writing a WAV file failed.
    #[error("failed to write WAV output: {0}")]
    Wav(#[from] std::io::Error),
}

/// Why a running producer stopped on its own.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ProducerFault {
    #[error("sink write failed: {0}")]
    Write(SinkError),
    #[error("producer panicked: {0}")]
    Panic(String),
}
