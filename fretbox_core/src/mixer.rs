/// Default ceiling for [`Mixer::limit`], full scale.
pub const UNITY_THRESHOLD: f32 = 1.0;

/// Stateless buffer helpers for anything producing audio.
///
/// None of these fail: a malformed call (empty or mismatched buffers) leaves
/// the output untouched so a misconfigured channel layout degrades to silence
/// instead of taking the callback down.
pub struct Mixer;

impl Mixer {
    /// `output[i] += input[i] * gain`. No-op when either buffer is empty or
    /// their lengths differ.
    #[inline]
    pub fn mix(input: &[f32], output: &mut [f32], gain: f32) {
        if input.is_empty() || output.is_empty() || input.len() != output.len() {
            return;
        }

        for (out, &sample) in output.iter_mut().zip(input) {
            *out += sample * gain;
        }
    }

    #[inline]
    pub fn clear(buffer: &mut [f32]) {
        buffer.fill(0.0);
    }

    /// Hard clip every sample into `[-threshold, threshold]`.
    ///
    /// Saturating only, no knee: anything above the ceiling is flattened.
    /// The sign of `threshold` is ignored; a NaN threshold does nothing.
    #[inline]
    pub fn limit(buffer: &mut [f32], threshold: f32) {
        let ceiling = threshold.abs();
        if ceiling.is_nan() {
            return;
        }

        for sample in buffer.iter_mut() {
            *sample = sample.clamp(-ceiling, ceiling);
        }
    }

    /// [`Mixer::limit`] at full scale.
    #[inline]
    pub fn limit_unity(buffer: &mut [f32]) {
        Self::limit(buffer, UNITY_THRESHOLD);
    }
}
