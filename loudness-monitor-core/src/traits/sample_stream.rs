use crate::models::audio_models::SampleFrame;
use crate::models::error::MonitorError;

/// An open microphone stream: device context plus the sample source feeding
/// a fixed-size analysis window.
///
/// Owned exclusively by one capture session and read from its sampler thread.
pub trait SampleStream: Send {
    /// Copy out the most recent analysis window.
    ///
    /// Must not block: the device fills the window on its own thread.
    /// Returns `DeviceLost` once the stream has ended.
    fn read_frame(&mut self) -> Result<SampleFrame, MonitorError>;

    /// Disconnect the source, stop all tracks and close the device context.
    ///
    /// Called exactly once by the session; implementations should tolerate
    /// a second call.
    fn close(&mut self);
}
