use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::audio_models::{AudioSource, AudioTransportType, SampleEncoding, SampleFrame};
use crate::models::error::MonitorError;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::sample_stream::SampleStream;

/// Amplitude script for a synthetic stream.
///
/// Every frame is a square wave at the scripted amplitude, so the frame RMS
/// equals the amplitude exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyntheticSignal {
    Silence,
    FullScale,
    Square { amplitude: f32 },
    /// Linear amplitude ramp over `frames` frames, then holds `to`.
    Ramp { from: f32, to: f32, frames: u64 },
}

impl SyntheticSignal {
    /// Amplitude of frame `index` (0-based), in `[0.0, 1.0]`.
    pub fn amplitude(&self, index: u64) -> f32 {
        let amplitude = match *self {
            Self::Silence => 0.0,
            Self::FullScale => 1.0,
            Self::Square { amplitude } => amplitude,
            Self::Ramp { from, to, frames } => {
                if frames <= 1 {
                    to
                } else {
                    let t = index.min(frames - 1) as f32 / (frames - 1) as f32;
                    from + (to - from) * t
                }
            }
        };
        amplitude.clamp(0.0, 1.0)
    }
}

/// Counters shared by a provider and every stream it opens.
#[derive(Debug, Default)]
pub struct SyntheticStats {
    requests: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    max_open: AtomicUsize,
    frames: AtomicU64,
}

impl SyntheticStats {
    /// Capture requests, granted or not.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn streams_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open_streams(&self) -> usize {
        self.streams_opened().saturating_sub(self.streams_closed())
    }

    /// Most streams ever open at the same time.
    pub fn max_open_streams(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

/// Scripted microphone for tests and hardware-free demos.
///
/// Can refuse access, lose the device after a number of frames, or be
/// unplugged on demand.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    signal: SyntheticSignal,
    encoding: SampleEncoding,
    denial: Option<MonitorError>,
    lose_device_after: Option<u64>,
    close_delay: Option<Duration>,
    unplugged: Arc<AtomicBool>,
    stats: Arc<SyntheticStats>,
}

impl SyntheticProvider {
    pub fn new(signal: SyntheticSignal) -> Self {
        Self {
            signal,
            encoding: SampleEncoding::Float32,
            denial: None,
            lose_device_after: None,
            close_delay: None,
            unplugged: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SyntheticStats::default()),
        }
    }

    /// Deliver frames in `encoding` instead of f32.
    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Refuse every capture request with `error`.
    pub fn denying(mut self, error: MonitorError) -> Self {
        self.denial = Some(error);
        self
    }

    /// End each stream with `DeviceLost` after `frames` successful reads.
    pub fn losing_device_after(mut self, frames: u64) -> Self {
        self.lose_device_after = Some(frames);
        self
    }

    /// Take `delay` to release each stream, like a backend joining its capture thread.
    pub fn closing_slowly(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    /// Simulate pulling the microphone: open streams fail with `DeviceLost`
    /// and new requests fail with `AccessUnavailable`.
    pub fn unplug(&self) {
        self.unplugged.store(true, Ordering::SeqCst);
    }

    pub fn replug(&self) {
        self.unplugged.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> Arc<SyntheticStats> {
        Arc::clone(&self.stats)
    }
}

impl CaptureProvider for SyntheticProvider {
    type Stream = SyntheticStream;

    fn is_available(&self) -> bool {
        !self.unplugged.load(Ordering::SeqCst)
    }

    fn request_capture(&self, window_size: usize) -> Result<SyntheticStream, MonitorError> {
        self.stats.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(ref error) = self.denial {
            return Err(error.clone());
        }
        if !self.is_available() {
            return Err(MonitorError::AccessUnavailable);
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let open = self.stats.open_streams();
        self.stats.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(SyntheticStream {
            signal: self.signal,
            encoding: self.encoding,
            window_size,
            frame_index: 0,
            lose_device_after: self.lose_device_after,
            close_delay: self.close_delay,
            unplugged: Arc::clone(&self.unplugged),
            stats: Arc::clone(&self.stats),
            closed: false,
        })
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "synthetic".into(),
            name: "Synthetic Microphone".into(),
            is_default: true,
            transport_type: Some(AudioTransportType::Virtual),
        }
    }
}

/// Stream opened by [`SyntheticProvider`].
#[derive(Debug)]
pub struct SyntheticStream {
    signal: SyntheticSignal,
    encoding: SampleEncoding,
    window_size: usize,
    frame_index: u64,
    lose_device_after: Option<u64>,
    close_delay: Option<Duration>,
    unplugged: Arc<AtomicBool>,
    stats: Arc<SyntheticStats>,
    closed: bool,
}

impl SampleStream for SyntheticStream {
    fn read_frame(&mut self) -> Result<SampleFrame, MonitorError> {
        if self.closed || self.unplugged.load(Ordering::SeqCst) {
            return Err(MonitorError::DeviceLost);
        }
        if self.lose_device_after.is_some_and(|limit| self.frame_index >= limit) {
            return Err(MonitorError::DeviceLost);
        }

        let amplitude = self.signal.amplitude(self.frame_index);
        let samples: Vec<f32> = (0..self.window_size)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect();

        self.frame_index += 1;
        self.stats.frames.fetch_add(1, Ordering::SeqCst);
        Ok(SampleFrame::from_normalized(self.encoding, &samples))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(delay) = self.close_delay {
            thread::sleep(delay);
        }
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::loudness::LoudnessEstimator;
    use crate::models::reading::SeverityTier;

    #[test]
    fn ramp_interpolates_then_holds() {
        let ramp = SyntheticSignal::Ramp {
            from: 0.0,
            to: 1.0,
            frames: 5,
        };
        assert_eq!(ramp.amplitude(0), 0.0);
        assert_eq!(ramp.amplitude(2), 0.5);
        assert_eq!(ramp.amplitude(4), 1.0);
        assert_eq!(ramp.amplitude(40), 1.0);
    }

    #[test]
    fn stream_frames_have_requested_window() {
        let provider = SyntheticProvider::new(SyntheticSignal::FullScale)
            .with_encoding(SampleEncoding::Signed16);
        let mut stream = provider.request_capture(128).unwrap();

        let frame = stream.read_frame().unwrap();
        assert_eq!(frame.len(), 128);
        assert_eq!(frame.encoding(), SampleEncoding::Signed16);
        assert_eq!(provider.stats().frames_read(), 1);
    }

    #[test]
    fn ramp_walks_up_the_tiers() {
        let provider = SyntheticProvider::new(SyntheticSignal::Ramp {
            from: 0.0,
            to: 1.0,
            frames: 4,
        });
        let mut stream = provider.request_capture(64).unwrap();
        let estimator = LoudnessEstimator::default();

        let first = estimator.estimate(&stream.read_frame().unwrap());
        let _ = stream.read_frame().unwrap();
        let _ = stream.read_frame().unwrap();
        let last = estimator.estimate(&stream.read_frame().unwrap());

        assert_eq!(first.tier, SeverityTier::Quiet);
        assert_eq!(last.tier, SeverityTier::Critical);
    }

    #[test]
    fn denial_opens_nothing() {
        let provider =
            SyntheticProvider::new(SyntheticSignal::Silence).denying(MonitorError::AccessDenied);
        assert_eq!(provider.request_capture(64).unwrap_err(), MonitorError::AccessDenied);
        assert_eq!(provider.stats().requests(), 1);
        assert_eq!(provider.stats().streams_opened(), 0);
    }

    #[test]
    fn device_lost_after_limit() {
        let provider = SyntheticProvider::new(SyntheticSignal::Silence).losing_device_after(2);
        let mut stream = provider.request_capture(16).unwrap();

        assert!(stream.read_frame().is_ok());
        assert!(stream.read_frame().is_ok());
        assert_eq!(stream.read_frame().unwrap_err(), MonitorError::DeviceLost);
    }

    #[test]
    fn unplug_ends_streams_and_blocks_requests() {
        let provider = SyntheticProvider::new(SyntheticSignal::Silence);
        let mut stream = provider.request_capture(16).unwrap();

        provider.unplug();
        assert_eq!(stream.read_frame().unwrap_err(), MonitorError::DeviceLost);
        assert_eq!(provider.request_capture(16).unwrap_err(), MonitorError::AccessUnavailable);

        provider.replug();
        assert!(provider.request_capture(16).is_ok());
    }

    #[test]
    fn closed_stream_is_never_reused() {
        let provider = SyntheticProvider::new(SyntheticSignal::Silence);
        let mut stream = provider.request_capture(16).unwrap();

        stream.close();
        stream.close();
        assert_eq!(stream.read_frame().unwrap_err(), MonitorError::DeviceLost);
        assert_eq!(provider.stats().streams_closed(), 1);
        assert_eq!(provider.stats().open_streams(), 0);
    }

    #[test]
    fn slow_close_counts_after_the_delay() {
        let provider = SyntheticProvider::new(SyntheticSignal::Silence)
            .closing_slowly(Duration::from_millis(30));
        let stats = provider.stats();
        let mut first = provider.request_capture(16).unwrap();
        let mut second = provider.request_capture(16).unwrap();
        assert_eq!(stats.max_open_streams(), 2);

        let started = std::time::Instant::now();
        first.close();
        assert!(started.elapsed() >= Duration::from_millis(30));
        second.close();
        assert_eq!(stats.open_streams(), 0);
        assert_eq!(stats.max_open_streams(), 2);
    }
}
