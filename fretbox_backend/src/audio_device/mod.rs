//! Query-only view of the audio devices exposed by the cpal host.

pub mod enumeration;

pub use enumeration::{DeviceEnumerator, DeviceInfo};
