use std::f64::consts::TAU;

use super::ToneSource;

/// Phase-accumulating sine generator.
///
/// Phase lives in `[0, 2π)` and is only ever moved by rendering or `reset`.
/// Changing frequency or sample rate changes the slope, never the position,
/// so retuning mid-buffer does not click.
#[derive(Debug, Clone)]
pub struct Oscillator {
    sample_rate: f64,
    frequency: f64,
    amplitude: f32,
    phase: f64,
    phase_increment: f64,
}

impl Oscillator {
    /// Create a silent oscillator (0 Hz, amplitude 1) running at `sample_rate`.
    pub fn new(sample_rate: f64) -> Self {
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            1.0
        };

        Self {
            sample_rate,
            frequency: 0.0,
            amplitude: 1.0,
            phase: 0.0,
            phase_increment: 0.0,
        }
    }

    /// Create a sine at `frequency` Hz.
    pub fn sine(sample_rate: f64, frequency: f64) -> Self {
        let mut osc = Self::new(sample_rate);
        osc.set_frequency(frequency);
        osc
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    // Setters for runtime modification

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
        self.update_increment();
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    /// Non-positive or non-finite rates are ignored.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return;
        }
        self.sample_rate = sample_rate;
        self.update_increment();
    }

    // Getters

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn phase_increment(&self) -> f64 {
        self.phase_increment
    }

    /// Produce one sample and advance.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let sample = self.amplitude * self.phase.sin() as f32;
        self.advance();
        sample
    }

    #[inline(always)]
    fn advance(&mut self) {
        // |increment| < 2π, so a single correction lands back in range
        self.phase += self.phase_increment;
        if self.phase >= TAU {
            self.phase -= TAU;
        } else if self.phase < 0.0 {
            self.phase += TAU;
            // a phase just below zero rounds up to exactly 2π
            if self.phase >= TAU {
                self.phase = 0.0;
            }
        }
    }

    fn update_increment(&mut self) {
        let increment = if self.frequency.is_finite() {
            TAU * self.frequency / self.sample_rate
        } else {
            0.0
        };
        // Frequencies at or above the sample rate alias anyway; keep the step
        // inside one turn so `advance` stays a single compare-and-subtract.
        self.phase_increment = increment % TAU;
    }
}

impl ToneSource for Oscillator {
    fn generate(&mut self, buffer: &mut [f32], accumulate: bool) {
        if accumulate {
            for sample in buffer.iter_mut() {
                *sample += self.next_sample();
            }
        } else {
            for sample in buffer.iter_mut() {
                *sample = self.next_sample();
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48_000.0;

    #[test]
    fn output_is_periodic_with_period_of_rate_over_frequency() {
        // 480 Hz at 48 kHz repeats every 100 samples
        let mut osc = Oscillator::sine(SR, 480.0).with_amplitude(0.8);
        let mut buffer = vec![0.0f32; 400];
        osc.generate(&mut buffer, false);

        for i in 0..300 {
            assert!(
                (buffer[i] - buffer[i + 100]).abs() < 1e-4,
                "sample {} differs from one period later: {} vs {}",
                i,
                buffer[i],
                buffer[i + 100]
            );
        }
    }

    #[test]
    fn output_stays_within_amplitude() {
        let mut osc = Oscillator::sine(SR, 82.41).with_amplitude(0.3);
        let mut buffer = vec![0.0f32; 4096];
        osc.generate(&mut buffer, false);

        let peak = buffer.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.3 + 1e-6);
        assert!(peak > 0.29, "a full cycle should reach the peak, got {}", peak);
    }

    #[test]
    fn first_sample_starts_at_zero_phase() {
        let mut osc = Oscillator::sine(SR, 440.0);
        assert_eq!(osc.next_sample(), 0.0);
    }

    #[test]
    fn frequency_change_keeps_phase() {
        let mut osc = Oscillator::sine(SR, 440.0);
        let mut buffer = vec![0.0f32; 123];
        osc.generate(&mut buffer, false);

        let before = osc.phase();
        assert!(before > 0.0);

        osc.set_frequency(329.63);
        assert_eq!(osc.phase(), before);
        osc.set_sample_rate(44_100.0);
        assert_eq!(osc.phase(), before);
        assert!((osc.phase_increment() - TAU * 329.63 / 44_100.0).abs() < 1e-12);
    }

    #[test]
    fn phase_stays_in_range_across_retuning() {
        let mut osc = Oscillator::sine(SR, 20.0);
        let mut buffer = vec![0.0f32; 64];
        for step in 0..200 {
            osc.set_frequency(20.0 + step as f64 * 97.0);
            osc.generate(&mut buffer, false);
            let phase = osc.phase();
            assert!((0.0..TAU).contains(&phase), "phase {} out of range", phase);
        }
    }

    #[test]
    fn negative_and_oversized_frequencies_keep_phase_in_range() {
        for step in 1..=2000 {
            let frequency = -12.0 * step as f64;
            let mut osc = Oscillator::sine(SR, frequency);
            for n in 0..SR as usize {
                osc.next_sample();
                assert!(
                    (0.0..TAU).contains(&osc.phase()),
                    "{} Hz: phase {} after {} samples",
                    frequency,
                    osc.phase(),
                    n + 1
                );
            }
        }

        let mut osc = Oscillator::sine(SR, SR * 2.5);
        assert!(osc.phase_increment().abs() < TAU);
        for _ in 0..1000 {
            osc.next_sample();
            assert!((0.0..TAU).contains(&osc.phase()));
        }
    }

    #[test]
    fn accumulate_adds_to_existing_content() {
        let mut reference = Oscillator::sine(SR, 196.0).with_amplitude(0.5);
        let mut expected = vec![0.0f32; 256];
        reference.generate(&mut expected, false);

        let mut osc = Oscillator::sine(SR, 196.0).with_amplitude(0.5);
        let mut buffer = vec![0.25f32; 256];
        osc.generate(&mut buffer, true);

        for (got, want) in buffer.iter().zip(&expected) {
            assert!((got - (want + 0.25)).abs() < 1e-6);
        }
    }

    #[test]
    fn overwrite_ignores_existing_content() {
        let mut osc = Oscillator::new(SR);
        let mut buffer = vec![0.7f32; 32];
        osc.generate(&mut buffer, false);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn reset_zeroes_phase_only() {
        let mut osc = Oscillator::sine(SR, 110.0).with_amplitude(0.4);
        let mut buffer = vec![0.0f32; 77];
        osc.generate(&mut buffer, false);

        osc.reset();
        assert_eq!(osc.phase(), 0.0);
        assert_eq!(osc.frequency(), 110.0);
        assert_eq!(osc.amplitude(), 0.4);
    }

    #[test]
    fn invalid_sample_rate_is_ignored() {
        let mut osc = Oscillator::sine(SR, 440.0);
        let increment = osc.phase_increment();
        osc.set_sample_rate(0.0);
        osc.set_sample_rate(f64::NAN);
        assert_eq!(osc.sample_rate(), SR);
        assert_eq!(osc.phase_increment(), increment);
    }
}
