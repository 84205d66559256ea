use crate::models::audio_models::AudioSource;
use crate::models::error::MonitorError;
use crate::traits::sample_stream::SampleStream;

/// Host capability to request microphone access.
///
/// Implemented by:
/// - `WasapiMicProvider` (Windows)
/// - `SyntheticProvider` (tests, demos without hardware)
pub trait CaptureProvider: Send + Sync {
    /// Stream type handed out on a successful request.
    type Stream: SampleStream + 'static;

    /// Whether a capture device is present at all.
    fn is_available(&self) -> bool;

    /// Ask the host for microphone access and open a stream delivering
    /// frames of `window_size` samples.
    ///
    /// May block while the host shows a permission prompt. Every call must
    /// open a fresh stream; a stream is never handed out twice.
    ///
    /// # Errors
    /// `AccessDenied` when the user or policy refuses, `AccessUnavailable`
    /// when no device can be opened.
    fn request_capture(&self, window_size: usize) -> Result<Self::Stream, MonitorError>;

    /// Information about the device backing this provider.
    fn device_info(&self) -> AudioSource;
}
