//! Windows microphone privacy permission check.
//!
//! On Windows 10 1803+, microphone access is controlled by the privacy
//! settings at Settings > Privacy > Microphone. Unpackaged desktop apps get
//! no consent dialog; when the toggle is off, activating the endpoint fails
//! with `E_ACCESSDENIED`.

use windows::Win32::Foundation::E_ACCESSDENIED;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use loudness_monitor_core::models::error::MonitorError;

use crate::com::ComScope;

/// Check whether the default microphone may be opened.
///
/// Returns `Ok(false)` when privacy settings block access.
///
/// # Errors
/// `AccessUnavailable` when there is no capture endpoint or it is held
/// exclusively by another application.
pub fn check_microphone_permission() -> Result<bool, MonitorError> {
    let _com = ComScope::enter()?;
    unsafe { try_default_capture() }
}

unsafe fn try_default_capture() -> Result<bool, MonitorError> {
    let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
        .map_err(|e| MonitorError::Unknown(format!("failed to create enumerator: {}", e)))?;

    let device = enumerator
        .GetDefaultAudioEndpoint(eCapture, eConsole)
        .map_err(|_| MonitorError::AccessUnavailable)?;

    match device.Activate::<IAudioClient>(CLSCTX_ALL, None) {
        Ok(_) => Ok(true),
        Err(e) if e.code() == E_ACCESSDENIED => Ok(false),
        Err(e) if e.code() == AUDCLNT_E_DEVICE_IN_USE => Err(MonitorError::AccessUnavailable),
        Err(e) => {
            // Unexpected: let the capture thread surface the real failure.
            log::warn!("Unexpected error checking mic permission: {}", e);
            Ok(true)
        }
    }
}
