use thiserror::Error;

/// Everything that can go wrong on the stream control path.
///
/// The realtime callback never sees these: its only way to report trouble is
/// returning [`StreamControl::Stop`](super::StreamControl::Stop).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// `open` called while a stream is already open or running.
    #[error("Device already open")]
    AlreadyOpen,

    /// Operation needs an open stream.
    #[error("Device not open")]
    NotOpen,

    /// `stop` called while the stream is not running.
    #[error("Stream not running")]
    NotRunning,

    /// `start` called on a stream that is already running.
    #[error("Stream already running")]
    AlreadyRunning,

    /// Failure reported by the audio driver, message kept verbatim.
    #[error("{0}")]
    Backend(String),

    #[error("Invalid stream configuration: {0}")]
    InvalidConfig(String),

    #[error("No audio device with id {0}")]
    DeviceNotFound(u32),

    /// Stream configuration could not be parsed.
    #[error("Failed to parse stream configuration: {0}")]
    Config(String),
}

impl StreamError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
