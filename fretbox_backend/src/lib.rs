//! Realtime audio streams for fretbox.
//!
//! [`stream::CpalStream`] drives real devices through cpal;
//! [`stream::ManualStream`] runs the same callback contract in memory.

pub mod audio_device;
pub mod rt_processing;
pub mod stream;

pub use audio_device::{DeviceEnumerator, DeviceInfo};
pub use rt_processing::performance::StatsSnapshot;
pub use stream::{
    AudioStream, CpalStream, DeviceId, ManualStream, StreamCallback, StreamConfig, StreamControl, StreamError,
    StreamResult, StreamState,
};
