//! Deterministic in-memory stream for tests.
//!
//! Nothing runs on its own: each [`ManualStream::run_cycle`] plays the part of
//! the backend thread and invokes the adapter once with `buffer_size` frames.
//! Backend failures can be injected to exercise error paths.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info};

use super::{
    AudioStream, DeviceId, StreamCallback, StreamConfig, StreamControl, StreamError, StreamResult,
    StreamState, record_error,
};
use crate::rt_processing::callback::{CallbackAdapter, RunFlag};
use crate::rt_processing::performance::{StatsSnapshot, StreamStats};

const DEFAULT_DEVICE_COUNT: u32 = 1;

/// `AudioStream` without hardware.
pub struct ManualStream {
    state: StreamState,
    config: Option<StreamConfig>,
    adapter: Option<CallbackAdapter>,
    running: RunFlag,
    device_count: u32,
    default_device: DeviceId,
    pending_input: VecDeque<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    fail_open: Option<String>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    last_error: Option<String>,
}

impl ManualStream {
    pub fn new() -> Self {
        Self {
            state: StreamState::Closed,
            config: None,
            adapter: None,
            running: RunFlag::new(),
            device_count: DEFAULT_DEVICE_COUNT,
            default_device: 0,
            pending_input: VecDeque::new(),
            input: Vec::new(),
            output: Vec::new(),
            fail_open: None,
            fail_start: None,
            fail_stop: None,
            last_error: None,
        }
    }

    /// Pretend the backend exposes `count` devices, `default` being the
    /// platform default.
    pub fn with_devices(mut self, count: u32, default: DeviceId) -> Self {
        self.device_count = count;
        self.default_device = default;
        self
    }

    /// Make the next `open` fail with `message` as the driver error.
    pub fn fail_next_open(&mut self, message: impl Into<String>) {
        self.fail_open = Some(message.into());
    }

    pub fn fail_next_start(&mut self, message: impl Into<String>) {
        self.fail_start = Some(message.into());
    }

    pub fn fail_next_stop(&mut self, message: impl Into<String>) {
        self.fail_stop = Some(message.into());
    }

    /// Queue interleaved samples for the input side. Periods that find the
    /// queue short are padded with silence.
    pub fn feed_input(&mut self, samples: &[f32]) {
        self.pending_input.extend(samples.iter().copied());
    }

    /// Play one backend period. Returns the output the callback produced,
    /// empty for input-only streams.
    pub fn run_cycle(&mut self) -> StreamResult<&[f32]> {
        self.reconcile();
        if self.state != StreamState::Running {
            return Err(StreamError::NotRunning);
        }

        let Some(config) = self.config else {
            return Err(StreamError::NotOpen);
        };
        let Some(adapter) = self.adapter.as_mut() else {
            return Err(StreamError::NotOpen);
        };

        let frames = config.buffer_size as usize;
        if self.pending_input.len() < self.input.len() {
            adapter.stats().record_input_underrun();
        }
        for slot in self.input.iter_mut() {
            *slot = self.pending_input.pop_front().unwrap_or(0.0);
        }

        if adapter.process(&self.input, &mut self.output, frames) == StreamControl::Stop {
            debug!("manual stream: callback requested stop");
            self.state = StreamState::Open;
        }

        Ok(&self.output)
    }

    /// Run up to `cycles` periods, stopping early if the stream ends.
    /// Returns how many periods ran.
    pub fn run_cycles(&mut self, cycles: usize) -> usize {
        let mut ran = 0;
        for _ in 0..cycles {
            if self.run_cycle().is_err() {
                break;
            }
            ran += 1;
            if self.state != StreamState::Running {
                break;
            }
        }
        ran
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.adapter.as_ref().map(|adapter| adapter.stats().snapshot())
    }

    /// Pick up a stop requested from inside the callback.
    fn reconcile(&mut self) {
        if self.state == StreamState::Running && !self.running.get() {
            self.state = StreamState::Open;
        }
    }
}

impl Default for ManualStream {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioStream for ManualStream {
    fn open(&mut self, device: DeviceId, config: &StreamConfig, callback: StreamCallback) -> StreamResult<()> {
        if self.state != StreamState::Closed {
            return Err(record_error(&mut self.last_error, StreamError::AlreadyOpen));
        }
        config
            .validate()
            .map_err(|e| record_error(&mut self.last_error, e))?;
        if device >= self.device_count {
            return Err(record_error(&mut self.last_error, StreamError::DeviceNotFound(device)));
        }
        if let Some(message) = self.fail_open.take() {
            return Err(record_error(&mut self.last_error, StreamError::Backend(message)));
        }

        let stats = Arc::new(StreamStats::new(config.period()));
        self.running = RunFlag::new();
        self.adapter = Some(CallbackAdapter::new(callback, config, self.running.clone(), stats));
        self.input = vec![0.0; config.input_period_len()];
        self.output = vec![0.0; config.output_period_len()];
        self.config = Some(*config);
        self.state = StreamState::Open;

        info!("manual stream opened on device {}: {}", device, config);
        Ok(())
    }

    fn open_default(&mut self, config: &StreamConfig, callback: StreamCallback) -> StreamResult<()> {
        self.open(self.default_device, config, callback)
    }

    fn start(&mut self) -> StreamResult<()> {
        self.reconcile();
        if self.state == StreamState::Closed {
            return Err(record_error(&mut self.last_error, StreamError::NotOpen));
        }
        if self.state == StreamState::Running {
            return Err(record_error(&mut self.last_error, StreamError::AlreadyRunning));
        }
        if let Some(message) = self.fail_start.take() {
            return Err(record_error(&mut self.last_error, StreamError::Backend(message)));
        }

        self.running.set(true);
        self.state = StreamState::Running;
        Ok(())
    }

    fn stop(&mut self) -> StreamResult<()> {
        self.reconcile();
        if self.state != StreamState::Running {
            return Err(record_error(&mut self.last_error, StreamError::NotRunning));
        }
        if let Some(message) = self.fail_stop.take() {
            return Err(record_error(&mut self.last_error, StreamError::Backend(message)));
        }

        self.running.set(false);
        self.state = StreamState::Open;
        Ok(())
    }

    fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }

        // teardown failures are swallowed
        self.fail_stop = None;
        self.running.set(false);
        self.adapter = None;
        self.config = None;
        self.input.clear();
        self.output.clear();
        self.pending_input.clear();
        self.state = StreamState::Closed;
        info!("manual stream closed");
    }

    fn state(&self) -> StreamState {
        if self.state == StreamState::Running && !self.running.get() {
            return StreamState::Open;
        }
        self.state
    }

    fn config(&self) -> Option<StreamConfig> {
        self.config
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        self.close();
    }
}
