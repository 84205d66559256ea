//! Microphone enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list active capture endpoints with
//! friendly names and transport types, so a configured `device_id` can be
//! resolved before monitoring starts.

use windows::core::BSTR;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Foundation::PROPERTYKEY;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::UI::Shell::PropertiesSystem::IPropertyStore;

use loudness_monitor_core::models::audio_models::{AudioSource, AudioTransportType};
use loudness_monitor_core::models::error::MonitorError;

/// Capture device enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, MonitorError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
                    MonitorError::Unknown(format!("failed to create enumerator: {}", e))
                })?;
            Ok(Self { enumerator })
        }
    }

    /// List active capture (microphone) endpoints.
    pub fn list_capture_devices(&self) -> Result<Vec<AudioSource>, MonitorError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .map_err(|e| MonitorError::Unknown(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| MonitorError::Unknown(format!("GetCount failed: {}", e)))?;

            let default_id = self.default_capture_device_id().ok();

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device_id(&device) else {
                    continue;
                };
                let is_default = default_id.as_deref() == Some(id.as_str());
                devices.push(describe(&device, id, is_default, i));
            }

            Ok(devices)
        }
    }

    /// The default capture endpoint ID.
    ///
    /// # Errors
    /// `AccessUnavailable` when no microphone is connected.
    pub fn default_capture_device_id(&self) -> Result<String, MonitorError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| MonitorError::AccessUnavailable)?;
            device_id(&device).ok_or_else(|| MonitorError::Unknown("GetId failed".into()))
        }
    }

    /// The default capture endpoint, described.
    pub fn default_capture_device(&self) -> Result<AudioSource, MonitorError> {
        let id = self.default_capture_device_id()?;
        self.find_capture_device(&id)
    }

    /// Look up an active capture endpoint by ID.
    pub fn find_capture_device(&self, id: &str) -> Result<AudioSource, MonitorError> {
        self.list_capture_devices()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(MonitorError::AccessUnavailable)
    }
}

unsafe fn device_id(device: &IMMDevice) -> Option<String> {
    let id = device.GetId().ok()?;
    let text = id.to_string().ok();
    CoTaskMemFree(Some(id.0 as *const _));
    text
}

unsafe fn describe(device: &IMMDevice, id: String, is_default: bool, index: u32) -> AudioSource {
    let store = device.OpenPropertyStore(STGM_READ).ok();
    let name = store
        .as_ref()
        .and_then(|s| read_string(s, &PKEY_Device_FriendlyName))
        .unwrap_or_else(|| format!("Microphone {}", index));
    let transport = store
        .as_ref()
        .and_then(|s| read_string(s, &PKEY_Device_EnumeratorName))
        .map(|enumerator| transport_from_enumerator(&enumerator))
        .unwrap_or(AudioTransportType::Unknown);

    AudioSource {
        id,
        name,
        is_default,
        transport_type: Some(transport),
    }
}

/// Read a string property, or `None` if absent.
unsafe fn read_string(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<String> {
    let value = store.GetValue(key).ok()?;
    if value.is_empty() {
        return None;
    }
    BSTR::try_from(&value).ok().map(|text| text.to_string())
}

fn transport_from_enumerator(name: &str) -> AudioTransportType {
    if name.contains("BTHLEENUM") {
        AudioTransportType::BluetoothLE
    } else if name.contains("BTHENUM") {
        AudioTransportType::Bluetooth
    } else if name.contains("USB") {
        AudioTransportType::Usb
    } else if name.contains("MMDEVAPI") || name.contains("HDAUDIO") {
        AudioTransportType::BuiltIn
    } else {
        AudioTransportType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_read_from_enumerator_name() {
        assert_eq!(transport_from_enumerator("BTHENUM"), AudioTransportType::Bluetooth);
        assert_eq!(transport_from_enumerator("BTHLEENUM"), AudioTransportType::BluetoothLE);
        assert_eq!(transport_from_enumerator("USB"), AudioTransportType::Usb);
        assert_eq!(transport_from_enumerator("HDAUDIO"), AudioTransportType::BuiltIn);
        assert_eq!(transport_from_enumerator("SWD"), AudioTransportType::Unknown);
    }
}
