//! # loudness-monitor-core
//!
//! Platform-agnostic live loudness monitor.
//!
//! Owns the microphone lifecycle, samples the stream on a fixed period, and
//! publishes a calibrated loudness reading plus a severity tier. Platform
//! backends (Windows WASAPI) implement the `CaptureProvider` trait and plug
//! into the generic `MonitorSession`.
//!
//! ## Architecture
//!
//! ```text
//! loudness-monitor-core (this crate)
//! ├── traits/       ← CaptureProvider, SampleStream, MonitorDelegate
//! ├── models/       ← MonitorError, MonitorState, LoudnessReading, MonitorConfiguration, etc.
//! ├── processing/   ← LoudnessEstimator, Calibration, TierBands, SampleWindow
//! ├── session/      ← MonitorSession (lifecycle manager), CaptureSession, ReadingSlot
//! └── sources/      ← SyntheticProvider (scripted microphone)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod sources;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioSource, AudioTransportType, SampleEncoding, SampleFrame};
pub use models::config::MonitorConfiguration;
pub use models::error::MonitorError;
pub use models::reading::{LoudnessReading, SeverityTier};
pub use models::session_info::SessionInfo;
pub use models::state::MonitorState;
pub use processing::loudness::{Calibration, LoudnessEstimator};
pub use processing::sample_window::SampleWindow;
pub use processing::tiers::TierBands;
pub use session::manager::MonitorSession;
pub use session::reading_slot::ReadingSlot;
pub use sources::synthetic::{SyntheticProvider, SyntheticSignal, SyntheticStats};
pub use traits::capture_provider::CaptureProvider;
pub use traits::monitor_delegate::MonitorDelegate;
pub use traits::sample_stream::SampleStream;
