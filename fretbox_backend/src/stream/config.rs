use std::fmt;
use std::time::Duration;

use cpal::{BufferSize, SampleRate};
use serde::{Deserialize, Serialize};

use super::error::{StreamError, StreamResult};

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Stream parameters requested at `open` time.
///
/// Either direction may be disabled by giving it 0 channels, but not both.
/// Every field has a default, so a partial JSON document is enough:
///
/// ```ignore
/// let config = StreamConfig::from_json(r#"{ "output_channels": 2, "input_channels": 0 }"#)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per callback.
    pub buffer_size: u32,
    pub input_channels: u16,
    pub output_channels: u16,
}

impl StreamConfig {
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            input_channels: 1,
            output_channels: 0,
        }
    }

    /// Input-only stream.
    pub fn capture(channels: u16) -> Self {
        Self::new()
            .with_input_channels(channels)
            .with_output_channels(0)
    }

    /// Output-only stream, e.g. for reference tones.
    pub fn playback(channels: u16) -> Self {
        Self::new()
            .with_input_channels(0)
            .with_output_channels(channels)
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_buffer_size(mut self, frames: u32) -> Self {
        self.buffer_size = frames;
        self
    }

    pub fn with_input_channels(mut self, channels: u16) -> Self {
        self.input_channels = channels;
        self
    }

    pub fn with_output_channels(mut self, channels: u16) -> Self {
        self.output_channels = channels;
        self
    }

    pub fn from_json(json: &str) -> StreamResult<Self> {
        serde_json::from_str(json).map_err(|e| StreamError::Config(e.to_string()))
    }

    pub fn has_input(&self) -> bool {
        self.input_channels > 0
    }

    pub fn has_output(&self) -> bool {
        self.output_channels > 0
    }

    pub fn validate(&self) -> StreamResult<()> {
        if self.sample_rate == 0 {
            return Err(StreamError::InvalidConfig("sample rate must be positive".into()));
        }
        if self.buffer_size == 0 {
            return Err(StreamError::InvalidConfig("buffer size must be positive".into()));
        }
        if !self.has_input() && !self.has_output() {
            return Err(StreamError::InvalidConfig(
                "at least one of input or output channels must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Samples in one interleaved input period.
    pub fn input_period_len(&self) -> usize {
        self.buffer_size as usize * self.input_channels as usize
    }

    /// Samples in one interleaved output period.
    pub fn output_period_len(&self) -> usize {
        self.buffer_size as usize * self.output_channels as usize
    }

    /// Wall-clock length of one buffer, the callback's deadline.
    pub fn period(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.buffer_size as u64 * 1_000_000_000 / self.sample_rate as u64)
    }

    pub fn latency_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// cpal parameters for one direction of this stream.
    pub(crate) fn to_cpal(&self, channels: u16) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: BufferSize::Fixed(self.buffer_size),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in {}ch / out {}ch @ {}Hz, {} frames ({:.1} ms)",
            self.input_channels,
            self.output_channels,
            self.sample_rate,
            self.buffer_size,
            self.latency_ms()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_capture_of_one_channel() {
        let config = StreamConfig::default();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.input_channels, 1);
        assert_eq!(config.output_channels, 0);
        assert_eq!(config, StreamConfig::capture(1));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = StreamConfig::from_json(r#"{ "buffer_size": 480, "output_channels": 1, "input_channels": 0 }"#)
            .expect("valid config");
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.buffer_size, 480);
        assert_eq!(config, StreamConfig::playback(1).with_buffer_size(480));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = StreamConfig::from_json("{ sample_rate: fast }").unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn validate_rejects_streams_without_direction() {
        let config = StreamConfig::new().with_input_channels(0);
        assert!(matches!(config.validate(), Err(StreamError::InvalidConfig(_))));
        assert!(StreamConfig::playback(2).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_rate_and_buffer() {
        assert!(StreamConfig::new().with_sample_rate(0).validate().is_err());
        assert!(StreamConfig::new().with_buffer_size(0).validate().is_err());
    }

    #[test]
    fn period_matches_buffer_duration() {
        let config = StreamConfig::playback(1).with_buffer_size(480);
        assert_eq!(config.period(), Duration::from_millis(10));
        assert!((config.latency_ms() - 10.0).abs() < 1e-4);
        assert_eq!(config.output_period_len(), 480);
        assert_eq!(config.input_period_len(), 0);
    }

    #[test]
    fn cpal_config_uses_fixed_buffer() {
        let cpal_config = StreamConfig::new().with_buffer_size(256).to_cpal(2);
        assert_eq!(cpal_config.channels, 2);
        assert_eq!(cpal_config.sample_rate, SampleRate(48_000));
        assert_eq!(cpal_config.buffer_size, BufferSize::Fixed(256));
    }
}
