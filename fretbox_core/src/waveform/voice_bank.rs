//! Six-voice sine bank, one voice per guitar string.
//!
//! The bank itself is owned by whoever renders audio (normally the realtime
//! callback). Its parameters live in a [`VoiceControls`] block made of
//! lock-free atomic cells, so a control thread holding
//! `Arc<VoiceControls>` can retune voices while the callback keeps running.
//!
//! Sharing contract:
//! - every parameter is a single atomic word, there are no torn writes;
//! - `generate` snapshots the controls once at the start of each buffer, so a
//!   change lands at most one buffer late;
//! - the render path never takes a lock and never allocates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam::atomic::AtomicCell;
use log::debug;

use super::{Oscillator, ToneSource};

/// Number of voices in a bank. Six strings, permanently.
pub const MAX_VOICES: usize = 6;

/// Parameters shared between the control thread and the render thread.
///
/// Out-of-range voice indices are ignored everywhere: setters on the render
/// path never fail.
pub struct VoiceControls {
    frequencies: [AtomicCell<f64>; MAX_VOICES],
    amplitudes: [AtomicCell<f32>; MAX_VOICES],
    global_volume: AtomicCell<f32>,
    sample_rate: AtomicCell<f64>,
    active_voices: AtomicUsize,
    reset_pending: AtomicBool,
}

impl VoiceControls {
    fn new(sample_rate: f64) -> Self {
        Self {
            frequencies: std::array::from_fn(|_| AtomicCell::new(0.0)),
            amplitudes: std::array::from_fn(|_| AtomicCell::new(0.0)),
            global_volume: AtomicCell::new(1.0),
            sample_rate: AtomicCell::new(sample_rate),
            active_voices: AtomicUsize::new(0),
            reset_pending: AtomicBool::new(false),
        }
    }

    /// Tune voice `index`. A positive frequency enables the voice at full
    /// per-voice amplitude, zero disables it. Negative and non-finite values
    /// count as zero.
    pub fn set_voice_frequency(&self, index: usize, frequency: f64) {
        if index >= MAX_VOICES {
            return;
        }

        let frequency = if frequency.is_finite() && frequency > 0.0 {
            frequency
        } else {
            0.0
        };

        self.frequencies[index].store(frequency);
        self.amplitudes[index].store(if frequency > 0.0 { 1.0 } else { 0.0 });
        self.update_active_count();
    }

    /// Tune all six voices at once, string order low to high.
    pub fn set_voice_frequencies(&self, frequencies: &[f32; MAX_VOICES]) {
        for (index, &frequency) in frequencies.iter().enumerate() {
            self.set_voice_frequency(index, f64::from(frequency));
        }
    }

    /// Per-voice level, applied on top of the bank's normalization.
    pub fn set_voice_amplitude(&self, index: usize, amplitude: f32) {
        if index >= MAX_VOICES {
            return;
        }
        self.amplitudes[index].store(amplitude);
    }

    /// Master level, clamped into `[0, 1]`.
    pub fn set_global_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.global_volume.store(volume);
    }

    /// Non-positive or non-finite rates are ignored.
    pub fn set_sample_rate(&self, sample_rate: f64) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.sample_rate.store(sample_rate);
        }
    }

    /// Ask the render side to restart every voice at phase zero before its
    /// next buffer.
    pub fn request_reset(&self) {
        self.reset_pending.store(true, Ordering::Release);
    }

    pub fn voice_frequency(&self, index: usize) -> Option<f64> {
        self.frequencies.get(index).map(AtomicCell::load)
    }

    pub fn voice_amplitude(&self, index: usize) -> Option<f32> {
        self.amplitudes.get(index).map(AtomicCell::load)
    }

    pub fn global_volume(&self) -> f32 {
        self.global_volume.load()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate.load()
    }

    /// Number of voices with a positive frequency.
    pub fn active_voice_count(&self) -> usize {
        self.active_voices.load(Ordering::Acquire)
    }

    fn update_active_count(&self) {
        let count = self
            .frequencies
            .iter()
            .filter(|frequency| frequency.load() > 0.0)
            .count();
        self.active_voices.store(count, Ordering::Release);
    }
}

/// Polyphonic sine generator with loudness-preserving normalization.
///
/// Summing `N` uncorrelated tones of equal amplitude grows the signal power
/// by `N`, so each voice is scaled by `1/√N`: a six-string chord carries the
/// same energy as a single open string and does not clip.
pub struct VoiceBank {
    voices: [Oscillator; MAX_VOICES],
    controls: Arc<VoiceControls>,
    applied_sample_rate: f64,
}

impl VoiceBank {
    pub fn new(sample_rate: f64) -> Self {
        let voices = std::array::from_fn(|_| Oscillator::new(sample_rate).with_amplitude(0.0));
        let applied_sample_rate = voices[0].sample_rate();

        Self {
            voices,
            controls: Arc::new(VoiceControls::new(applied_sample_rate)),
            applied_sample_rate,
        }
    }

    /// Handle for retuning the bank from another thread.
    pub fn controls(&self) -> Arc<VoiceControls> {
        Arc::clone(&self.controls)
    }

    pub fn set_voice_frequency(&mut self, index: usize, frequency: f64) {
        self.controls.set_voice_frequency(index, frequency);
    }

    pub fn set_voice_frequencies(&mut self, frequencies: &[f32; MAX_VOICES]) {
        self.controls.set_voice_frequencies(frequencies);
    }

    pub fn set_voice_amplitude(&mut self, index: usize, amplitude: f32) {
        self.controls.set_voice_amplitude(index, amplitude);
    }

    pub fn set_global_volume(&mut self, volume: f32) {
        self.controls.set_global_volume(volume);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        debug!("voice bank sample rate -> {} Hz", sample_rate);
        self.controls.set_sample_rate(sample_rate);
    }

    pub fn global_volume(&self) -> f32 {
        self.controls.global_volume()
    }

    pub fn voice_frequency(&self, index: usize) -> Option<f64> {
        self.controls.voice_frequency(index)
    }

    pub fn active_voice_count(&self) -> usize {
        self.controls.active_voice_count()
    }

    /// Borrow voice `index` as rendered by the last `generate` call.
    pub fn voice(&self, index: usize) -> Option<&Oscillator> {
        self.voices.get(index)
    }

    /// Pull the latest control values into the oscillators.
    fn sync_controls(&mut self) {
        if self.controls.reset_pending.swap(false, Ordering::AcqRel) {
            for voice in &mut self.voices {
                voice.reset();
            }
        }

        let sample_rate = self.controls.sample_rate();
        if sample_rate != self.applied_sample_rate {
            for voice in &mut self.voices {
                voice.set_sample_rate(sample_rate);
            }
            self.applied_sample_rate = sample_rate;
        }

        for (voice, frequency) in self.voices.iter_mut().zip(&self.controls.frequencies) {
            let frequency = frequency.load();
            if frequency != voice.frequency() {
                voice.set_frequency(frequency);
            }
        }
    }
}

impl ToneSource for VoiceBank {
    fn generate(&mut self, buffer: &mut [f32], accumulate: bool) {
        self.sync_controls();

        let active = self.voices.iter().filter(|v| v.frequency() > 0.0).count();
        if active == 0 {
            if !accumulate {
                buffer.fill(0.0);
            }
            return;
        }

        let effective_volume = self.controls.global_volume() / (active as f32).sqrt();

        if !accumulate {
            buffer.fill(0.0);
        }

        for (voice, amplitude) in self.voices.iter_mut().zip(&self.controls.amplitudes) {
            if voice.frequency() > 0.0 {
                voice.set_amplitude(effective_volume * amplitude.load());
                voice.generate(buffer, true);
            }
        }
    }

    fn reset(&mut self) {
        self.controls.reset_pending.store(false, Ordering::Release);
        for voice in &mut self.voices {
            voice.reset();
        }
    }
}
