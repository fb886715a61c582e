//! Tone synthesis for the fretbox signal path.
//!
//! Everything here is safe to call from a realtime audio callback: buffers are
//! caller-owned slices, nothing allocates and nothing locks.

pub mod mixer;
pub mod waveform;

pub use mixer::Mixer;
pub use waveform::{MAX_VOICES, Oscillator, ToneSource, VoiceBank, VoiceControls};
