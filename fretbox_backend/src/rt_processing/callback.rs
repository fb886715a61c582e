//! Realtime side of a stream: the fixed adapter the backend calls every period.
//!
//! Design goals:
//! - No OS mutex, syscall or allocation on the audio thread.
//! - The control thread gates the callback through one atomic flag, so a
//!   stream that the driver happens to start early stays silent until
//!   `start`.
//! - A user callback that asks to stop, or panics, is never called again for
//!   this run; the adapter plays silence until the control side catches up.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::rt_processing::performance::StreamStats;
use crate::stream::{StreamCallback, StreamConfig, StreamControl};

/// Shared on/off switch between the control thread and the adapter.
#[derive(Clone, Default)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, running: bool) {
        self.0.store(running, Ordering::Release);
    }

    #[inline(always)]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Wraps the raw backend buffers into bounded views and calls the user
/// callback with them.
pub struct CallbackAdapter {
    callback: StreamCallback,
    input_channels: usize,
    output_channels: usize,
    running: RunFlag,
    stats: Arc<StreamStats>,
}

impl CallbackAdapter {
    pub fn new(callback: StreamCallback, config: &StreamConfig, running: RunFlag, stats: Arc<StreamStats>) -> Self {
        Self {
            callback,
            input_channels: config.input_channels as usize,
            output_channels: config.output_channels as usize,
            running,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }

    /// Run one period of `frames` frames.
    ///
    /// `input` and `output` are the backend's interleaved regions; views
    /// handed to the user are cut to `frames * channels`. Output beyond the
    /// view is zeroed. Returns [`StreamControl::Stop`] when the stream is not
    /// running or the callback ended it.
    pub fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) -> StreamControl {
        if !self.running.get() {
            output.fill(0.0);
            return StreamControl::Stop;
        }

        let _timer = self.stats.time_callback();
        self.stats.add_frames(frames as u64);

        let input_len = (frames * self.input_channels).min(input.len());
        let output_len = (frames * self.output_channels).min(output.len());
        let input_view = &input[..input_len];
        let (output_view, tail) = output.split_at_mut(output_len);
        tail.fill(0.0);

        let callback = &mut self.callback;
        let verdict = panic::catch_unwind(AssertUnwindSafe(|| callback(input_view, output_view)));

        match verdict {
            Ok(StreamControl::Continue) => StreamControl::Continue,
            Ok(StreamControl::Stop) => {
                self.running.set(false);
                StreamControl::Stop
            }
            Err(_) => {
                // a fault on the audio thread can only become "stop"
                output_view.fill(0.0);
                self.running.set(false);
                StreamControl::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    fn adapter(config: &StreamConfig, callback: StreamCallback) -> (CallbackAdapter, RunFlag) {
        let running = RunFlag::new();
        let stats = Arc::new(StreamStats::new(Duration::from_millis(10)));
        (CallbackAdapter::new(callback, config, running.clone(), stats), running)
    }

    #[test]
    fn idle_adapter_outputs_silence_without_calling_user() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let config = StreamConfig::playback(1).with_buffer_size(4);
        let (mut adapter, _running) = adapter(
            &config,
            Box::new(move |_, out| {
                seen.fetch_add(1, Ordering::Relaxed);
                out.fill(1.0);
                StreamControl::Continue
            }),
        );

        let mut output = [0.5f32; 4];
        assert_eq!(adapter.process(&[], &mut output, 4), StreamControl::Stop);
        assert_eq!(output, [0.0; 4]);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn views_are_sized_by_frames_and_channels() {
        let config = StreamConfig::new()
            .with_input_channels(2)
            .with_output_channels(1)
            .with_buffer_size(3);
        let (mut adapter, running) = adapter(
            &config,
            Box::new(|input, output| {
                assert_eq!(input.len(), 6);
                assert_eq!(output.len(), 3);
                output.copy_from_slice(&[input[0], input[2], input[4]]);
                StreamControl::Continue
            }),
        );
        running.set(true);

        let input = [1.0, 9.0, 2.0, 9.0, 3.0, 9.0, 7.0, 7.0];
        let mut output = [0.3f32; 5];
        assert_eq!(adapter.process(&input, &mut output, 3), StreamControl::Continue);
        assert_eq!(output, [1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(adapter.stats().snapshot().frames, 3);
    }

    #[test]
    fn disabled_direction_gets_empty_view() {
        let config = StreamConfig::capture(1).with_buffer_size(8);
        let (mut adapter, running) = adapter(
            &config,
            Box::new(|input, output| {
                assert_eq!(input.len(), 8);
                assert!(output.is_empty());
                StreamControl::Continue
            }),
        );
        running.set(true);

        assert_eq!(adapter.process(&[0.0; 8], &mut [], 8), StreamControl::Continue);
    }

    #[test]
    fn stop_verdict_clears_run_flag() {
        let config = StreamConfig::playback(1).with_buffer_size(2);
        let (mut adapter, running) = adapter(&config, Box::new(|_, _| StreamControl::Stop));
        running.set(true);

        let mut output = [0.0f32; 2];
        assert_eq!(adapter.process(&[], &mut output, 2), StreamControl::Stop);
        assert!(!running.get());
    }

    #[test]
    fn panicking_callback_becomes_stop() {
        let config = StreamConfig::playback(1).with_buffer_size(2);
        let (mut adapter, running) = adapter(
            &config,
            Box::new(|_, out| {
                out.fill(0.9);
                panic!("callback fault");
            }),
        );
        running.set(true);

        let mut output = [0.0f32; 2];
        assert_eq!(adapter.process(&[], &mut output, 2), StreamControl::Stop);
        assert_eq!(output, [0.0, 0.0]);
        assert!(!running.get());
    }
}
