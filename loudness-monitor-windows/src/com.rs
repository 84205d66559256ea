use windows::Win32::System::Com::*;

use loudness_monitor_core::models::error::MonitorError;

/// COM apartment for the current thread, released on drop.
pub(crate) struct ComScope;

impl ComScope {
    pub(crate) fn enter() -> Result<Self, MonitorError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| MonitorError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        }
        Ok(Self)
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
