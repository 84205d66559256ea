//! # loudness-monitor-windows
//!
//! Windows WASAPI backend for loudness-monitor.
//!
//! Provides:
//! - `WasapiMicProvider`: Microphone capture via WASAPI capture endpoint
//! - `DeviceEnumerator`: Capture device enumeration via MMDevice API
//! - `permissions`: Windows microphone privacy check
//!
//! ## Platform Requirements
//! - Windows 10 1803+ for the microphone privacy toggle
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use loudness_monitor_core::MonitorSession;
//! use loudness_monitor_windows::WasapiMicProvider;
//!
//! let monitor = MonitorSession::with_defaults(WasapiMicProvider::default_device());
//! monitor.set_activation(true)?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;
// Platform-independent so its timeout handling is tested on every host.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
mod startup;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_mic::{WasapiMicProvider, WasapiMicStream};
