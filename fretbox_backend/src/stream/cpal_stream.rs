//! Production stream on top of cpal.
//!
//! cpal hands out one callback per direction. Input-only and output-only
//! streams map onto a single cpal stream. A duplex stream runs an input and
//! an output stream side by side: the input callback pushes samples into a
//! bounded lock-free queue and the user callback runs on the output thread
//! with the queued samples as its input view.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam::queue::ArrayQueue;
use log::{debug, error, info};
use parking_lot::Mutex;

use super::{
    AudioStream, DeviceId, StreamCallback, StreamConfig, StreamError, StreamResult, StreamState,
    record_error,
};
use crate::audio_device::DeviceEnumerator;
use crate::rt_processing::callback::{CallbackAdapter, RunFlag};
use crate::rt_processing::performance::{StatsSnapshot, StreamStats};

/// Input periods the duplex bridge can hold before dropping the oldest.
const BRIDGE_PERIODS: usize = 4;

type ErrorSlot = Arc<Mutex<Option<String>>>;

pub struct CpalStream {
    state: StreamState,
    config: Option<StreamConfig>,
    streams: Vec<cpal::Stream>,
    running: RunFlag,
    stats: Option<Arc<StreamStats>>,
    has_input: bool,
    has_output: bool,
    last_error: Option<String>,
    /// Errors cpal reports from its own threads after the stream is built.
    stream_errors: ErrorSlot,
}

impl CpalStream {
    pub fn new() -> Self {
        Self {
            state: StreamState::Closed,
            config: None,
            streams: Vec::new(),
            running: RunFlag::new(),
            stats: None,
            has_input: false,
            has_output: false,
            last_error: None,
            stream_errors: Arc::new(Mutex::new(None)),
        }
    }

    pub fn has_input(&self) -> bool {
        self.has_input
    }

    pub fn has_output(&self) -> bool {
        self.has_output
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.stats.as_ref().map(|stats| stats.snapshot())
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        self.stream_errors.lock().take();
        record_error(&mut self.last_error, err)
    }

    fn open_device(
        &mut self,
        device: &cpal::Device,
        id: DeviceId,
        config: &StreamConfig,
        callback: StreamCallback,
    ) -> StreamResult<()> {
        let running = RunFlag::new();
        let stats = Arc::new(StreamStats::new(config.period()));
        let adapter = CallbackAdapter::new(callback, config, running.clone(), Arc::clone(&stats));

        let streams = match (config.has_input(), config.has_output()) {
            (true, false) => vec![build_input_only(device, config, adapter, &self.stream_errors)],
            (false, true) => vec![build_output(device, config, adapter, None, &self.stream_errors)],
            _ => build_duplex(device, config, adapter, &stats, &self.stream_errors),
        };
        let streams = streams
            .into_iter()
            .collect::<StreamResult<Vec<_>>>()
            .map_err(|e| self.fail(e))?;

        self.stream_errors.lock().take();
        self.streams = streams;
        self.running = running;
        self.stats = Some(stats);
        self.has_input = config.has_input();
        self.has_output = config.has_output();
        self.config = Some(*config);
        self.state = StreamState::Open;

        info!(
            "opened device {} ({}): {}",
            id,
            device.name().unwrap_or_else(|_| "unknown".into()),
            config
        );
        Ok(())
    }

    /// Catch up with a stop requested from inside the callback.
    fn reconcile(&mut self) {
        if self.state == StreamState::Running && !self.running.get() {
            debug!("callback ended the stream, pausing backend");
            for stream in &self.streams {
                let _ = stream.pause();
            }
            self.state = StreamState::Open;
        }
    }
}

impl Default for CpalStream {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioStream for CpalStream {
    fn open(&mut self, device: DeviceId, config: &StreamConfig, callback: StreamCallback) -> StreamResult<()> {
        if self.state != StreamState::Closed {
            return Err(self.fail(StreamError::AlreadyOpen));
        }
        config.validate().map_err(|e| self.fail(e))?;

        let enumerator = DeviceEnumerator::new().map_err(|e| self.fail(e))?;
        let handle = enumerator.select_device(device).map_err(|e| self.fail(e))?.clone();
        self.open_device(&handle, device, config, callback)
    }

    fn open_default(&mut self, config: &StreamConfig, callback: StreamCallback) -> StreamResult<()> {
        if self.state != StreamState::Closed {
            return Err(self.fail(StreamError::AlreadyOpen));
        }
        config.validate().map_err(|e| self.fail(e))?;

        let enumerator = DeviceEnumerator::new().map_err(|e| self.fail(e))?;
        // an output-only stream cannot be built on a capture device
        let default = if config.has_input() {
            enumerator.default_input_device()
        } else {
            enumerator.default_output_device()
        };
        let id = default.map(|info| info.id).map_err(|e| self.fail(e))?;
        let handle = enumerator.select_device(id).map_err(|e| self.fail(e))?.clone();
        self.open_device(&handle, id, config, callback)
    }

    fn start(&mut self) -> StreamResult<()> {
        self.reconcile();
        match self.state {
            StreamState::Closed => return Err(self.fail(StreamError::NotOpen)),
            StreamState::Running => return Err(self.fail(StreamError::AlreadyRunning)),
            StreamState::Open => {}
        }

        self.running.set(true);
        if let Some(err) = self.streams.iter().find_map(|stream| stream.play().err()) {
            self.running.set(false);
            for stream in &self.streams {
                let _ = stream.pause();
            }
            return Err(self.fail(StreamError::backend(err)));
        }

        self.state = StreamState::Running;
        info!("audio stream started");
        Ok(())
    }

    fn stop(&mut self) -> StreamResult<()> {
        self.reconcile();
        if self.state != StreamState::Running {
            return Err(self.fail(StreamError::NotRunning));
        }

        self.running.set(false);
        if let Some(err) = self.streams.iter().find_map(|stream| stream.pause().err()) {
            self.running.set(true);
            return Err(self.fail(StreamError::backend(err)));
        }

        self.state = StreamState::Open;
        info!("audio stream stopped");
        Ok(())
    }

    fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }

        self.running.set(false);
        for stream in &self.streams {
            // teardown must not fail
            let _ = stream.pause();
        }
        // dropping a cpal stream waits for its callback to return
        self.streams.clear();
        self.stream_errors.lock().take();
        self.config = None;
        self.has_input = false;
        self.has_output = false;
        self.state = StreamState::Closed;
        info!("audio stream closed");
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
        self.stream_errors
            .lock()
            .clone()
            .or_else(|| self.last_error.clone())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

fn error_handler(slot: &ErrorSlot, direction: &'static str) -> impl FnMut(cpal::StreamError) + Send + 'static {
    let slot = Arc::clone(slot);
    move |err| {
        error!("{} stream error: {}", direction, err);
        *slot.lock() = Some(err.to_string());
    }
}

fn build_input_only(
    device: &cpal::Device,
    config: &StreamConfig,
    mut adapter: CallbackAdapter,
    errors: &ErrorSlot,
) -> StreamResult<cpal::Stream> {
    let channels = config.input_channels as usize;
    device
        .build_input_stream(
            &config.to_cpal(config.input_channels),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let frames = data.len() / channels;
                adapter.process(data, &mut [], frames);
            },
            error_handler(errors, "input"),
            None,
        )
        .map_err(StreamError::backend)
}

/// Output stream running the adapter. With a `bridge`, each period first
/// drains `frames * input_channels` captured samples into the input view.
fn build_output(
    device: &cpal::Device,
    config: &StreamConfig,
    mut adapter: CallbackAdapter,
    bridge: Option<(Arc<ArrayQueue<f32>>, Arc<StreamStats>)>,
    errors: &ErrorSlot,
) -> StreamResult<cpal::Stream> {
    let output_channels = config.output_channels as usize;
    let input_channels = if bridge.is_some() { config.input_channels as usize } else { 0 };
    // bridge capacity; never grown on the audio thread
    let mut scratch = vec![0.0f32; config.input_period_len() * BRIDGE_PERIODS];

    device
        .build_output_stream(
            &config.to_cpal(config.output_channels),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / output_channels;
                let Some((queue, stats)) = bridge.as_ref() else {
                    adapter.process(&[], data, frames);
                    return;
                };

                match drain_bridge(queue, &mut scratch, frames * input_channels, stats) {
                    Some(input) => {
                        adapter.process(input, data, frames);
                    }
                    None => data.fill(0.0),
                }
            },
            error_handler(errors, "output"),
            None,
        )
        .map_err(StreamError::backend)
}

/// Move `needed` captured samples from the bridge into `scratch`, padding
/// with zeros when the queue runs dry. A period larger than `scratch` is
/// not filled at all: it is counted as an underrun and the caller plays
/// silence.
fn drain_bridge<'a>(
    queue: &ArrayQueue<f32>,
    scratch: &'a mut [f32],
    needed: usize,
    stats: &StreamStats,
) -> Option<&'a [f32]> {
    let Some(view) = scratch.get_mut(..needed) else {
        stats.record_input_underrun();
        return None;
    };

    let mut short = false;
    for slot in view.iter_mut() {
        *slot = queue.pop().unwrap_or_else(|| {
            short = true;
            0.0
        });
    }
    if short {
        stats.record_input_underrun();
    }
    Some(&*view)
}

fn build_duplex(
    device: &cpal::Device,
    config: &StreamConfig,
    adapter: CallbackAdapter,
    stats: &Arc<StreamStats>,
    errors: &ErrorSlot,
) -> Vec<StreamResult<cpal::Stream>> {
    let queue = Arc::new(ArrayQueue::new(config.input_period_len() * BRIDGE_PERIODS));

    let producer = Arc::clone(&queue);
    let overruns = Arc::clone(stats);
    let input = device
        .build_input_stream(
            &config.to_cpal(config.input_channels),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut dropped = false;
                for &sample in data {
                    dropped |= producer.force_push(sample).is_some();
                }
                if dropped {
                    overruns.record_input_overrun();
                }
            },
            error_handler(errors, "input"),
            None,
        )
        .map_err(StreamError::backend);

    let output = build_output(device, config, adapter, Some((queue, Arc::clone(stats))), errors);
    vec![input, output]
}
