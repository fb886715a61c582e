pub mod oscillator;
pub mod voice_bank;

pub use oscillator::Oscillator;
pub use voice_bank::{MAX_VOICES, VoiceBank, VoiceControls};

/// Anything that can render mono samples into a caller-provided buffer.
///
/// `generate` runs on the audio thread: it must not block or allocate.
pub trait ToneSource: Send {
    /// Render `buffer.len()` samples. With `accumulate` the samples are added
    /// to what the buffer already holds, otherwise they overwrite it.
    fn generate(&mut self, buffer: &mut [f32], accumulate: bool);

    /// Return to phase zero without touching pitch or level.
    fn reset(&mut self);
}
