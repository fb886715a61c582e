//! Audio stream abstraction.
//!
//! ```text
//!            open             start
//!  Closed ----------> Open ----------> Running
//!    ^                 ^  <----------     |
//!    |                 |     stop         |
//!    +------ close ----+------------------+
//! ```
//!
//! A failed `open`/`start`/`stop` leaves the state where it was and records
//! the error text for [`AudioStream::last_error`]. `close` never fails.

pub mod config;
pub mod cpal_stream;
pub mod error;
pub mod manual;

pub use config::StreamConfig;
pub use cpal_stream::CpalStream;
pub use error::{StreamError, StreamResult};
pub use manual::ManualStream;

/// Index of a device in the backend's device list.
pub type DeviceId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Open,
    Running,
}

/// Verdict returned by the user callback after each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    /// End the stream after this period. The only way to stop from inside
    /// the realtime thread.
    Stop,
}

impl From<i32> for StreamControl {
    /// C-style status: 0 continues, anything else stops.
    fn from(code: i32) -> Self {
        if code == 0 { Self::Continue } else { Self::Stop }
    }
}

/// User audio callback, run on the backend's realtime thread.
///
/// Receives the interleaved input (`frames * input_channels` samples, empty
/// when input is disabled) and the interleaved output to fill
/// (`frames * output_channels`, empty when output is disabled). Whatever
/// context the callback needs is captured by the closure.
///
/// Must not block, lock or allocate.
pub type StreamCallback = Box<dyn FnMut(&[f32], &mut [f32]) -> StreamControl + Send + 'static>;

/// Capability interface shared by the cpal stream and the in-memory double.
pub trait AudioStream {
    /// Open `device` with `config`. Fails with [`StreamError::AlreadyOpen`]
    /// unless the stream is closed.
    fn open(&mut self, device: DeviceId, config: &StreamConfig, callback: StreamCallback) -> StreamResult<()>;

    /// Open the platform default device for `config`.
    fn open_default(&mut self, config: &StreamConfig, callback: StreamCallback) -> StreamResult<()>;

    fn start(&mut self) -> StreamResult<()>;

    fn stop(&mut self) -> StreamResult<()>;

    /// Stop if running, release backend resources, end up closed. Idempotent.
    fn close(&mut self);

    fn state(&self) -> StreamState;

    /// Configuration of the currently open stream.
    fn config(&self) -> Option<StreamConfig>;

    fn last_error(&self) -> Option<String>;

    fn is_open(&self) -> bool {
        self.state() != StreamState::Closed
    }

    fn is_running(&self) -> bool {
        self.state() == StreamState::Running
    }
}

/// Remember `err` as the last error and hand it back for `?`.
pub(crate) fn record_error(slot: &mut Option<String>, err: StreamError) -> StreamError {
    log::warn!("audio stream: {}", err);
    *slot = Some(err.to_string());
    err
}
