use crate::models::error::MonitorError;
use crate::models::reading::LoudnessReading;
use crate::models::state::MonitorState;

/// Event delegate for monitor notifications.
///
/// Reading updates arrive on the sampler thread; state changes arrive on
/// whichever thread caused them. Implementations should marshal to the UI
/// thread if needed. Calling `deactivate` from inside a callback is allowed.
pub trait MonitorDelegate: Send + Sync {
    /// Called when the monitor starts or stops capturing.
    fn on_state_changed(&self, state: &MonitorState);

    /// Called once per sampling tick with the new reading.
    fn on_reading_updated(&self, reading: &LoudnessReading);

    /// Called when acquisition fails or the device is lost.
    fn on_error(&self, error: &MonitorError);
}
