//! WASAPI microphone provider.
//!
//! Opens a capture endpoint in shared mode on a dedicated thread. Incoming
//! buffers are downmixed to mono and written into a latest-window
//! `SampleWindow`; the monitor's sampler copies that window out each tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::{w, Error, PCWSTR};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use loudness_monitor_core::models::audio_models::{AudioSource, SampleFrame};
use loudness_monitor_core::models::config::MonitorConfiguration;
use loudness_monitor_core::models::error::MonitorError;
use loudness_monitor_core::processing::sample_window::{downmix_to_mono, SampleWindow};
use loudness_monitor_core::traits::capture_provider::CaptureProvider;
use loudness_monitor_core::traits::sample_stream::SampleStream;

use crate::com::ComScope;
use crate::device_enumerator::DeviceEnumerator;
use crate::permissions::check_microphone_permission;
use crate::startup::{await_startup, StartupReport};

const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Shared-mode buffer duration, in 100-nanosecond units (100ms).
const BUFFER_DURATION: i64 = 1_000_000;

/// How long `request_capture` waits for the capture thread to open the device.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// WASAPI microphone.
///
/// Each `request_capture` checks the privacy setting, then opens the
/// endpoint on a new capture thread.
#[derive(Debug, Clone)]
pub struct WasapiMicProvider {
    device_id: Option<String>,
    source: AudioSource,
}

impl WasapiMicProvider {
    /// Follow the system default microphone.
    pub fn default_device() -> Self {
        let source = with_enumerator(|e| e.default_capture_device()).unwrap_or_else(|e| {
            log::debug!("Default microphone not resolved yet: {}", e);
            AudioSource {
                id: "default-mic".into(),
                name: "Default Microphone".into(),
                is_default: true,
                transport_type: None,
            }
        });
        Self {
            device_id: None,
            source,
        }
    }

    /// Capture from a specific endpoint.
    pub fn with_device(source: AudioSource) -> Self {
        Self {
            device_id: Some(source.id.clone()),
            source,
        }
    }

    /// Resolve `config.device_id`, falling back to the default microphone.
    ///
    /// # Errors
    /// `AccessUnavailable` when the configured device is not connected.
    pub fn from_config(config: &MonitorConfiguration) -> Result<Self, MonitorError> {
        match config.device_id {
            Some(ref id) => with_enumerator(|e| e.find_capture_device(id)).map(Self::with_device),
            None => Ok(Self::default_device()),
        }
    }

    /// All active microphones.
    pub fn list_devices() -> Result<Vec<AudioSource>, MonitorError> {
        with_enumerator(|e| e.list_capture_devices())
    }
}

fn with_enumerator<T>(
    f: impl FnOnce(&DeviceEnumerator) -> Result<T, MonitorError>,
) -> Result<T, MonitorError> {
    let _com = ComScope::enter()?;
    let enumerator = DeviceEnumerator::new()?;
    f(&enumerator)
}

impl CaptureProvider for WasapiMicProvider {
    type Stream = WasapiMicStream;

    fn is_available(&self) -> bool {
        with_enumerator(|e| e.list_capture_devices())
            .map(|devices| match self.device_id {
                Some(ref id) => devices.iter().any(|d| &d.id == id),
                None => !devices.is_empty(),
            })
            .unwrap_or(false)
    }

    fn request_capture(&self, window_size: usize) -> Result<WasapiMicStream, MonitorError> {
        if !check_microphone_permission()? {
            log::warn!("Microphone access is disabled in Windows privacy settings");
            return Err(MonitorError::AccessDenied);
        }

        let window = Arc::new(Mutex::new(SampleWindow::new(window_size)));
        let running = Arc::new(AtomicBool::new(true));
        let alive = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread_window = Arc::clone(&window);
        let thread_running = Arc::clone(&running);
        let thread_alive = Arc::clone(&alive);
        let device_id = self.device_id.clone();

        let handle = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || {
                let result = capture_loop(
                    &thread_running,
                    device_id.as_deref(),
                    &thread_window,
                    &ready_tx,
                );
                if let Err(e) = result {
                    // Startup failures go back through the channel; later ones end the stream.
                    if ready_tx.try_send(Err(e.clone())).is_err() {
                        log::error!("Mic capture ended: {}", e);
                    }
                }
                thread_alive.store(false, Ordering::SeqCst);
            })
            .map_err(|e| MonitorError::Unknown(format!("failed to spawn mic thread: {}", e)))?;

        let handle = await_startup(&ready_rx, handle, &running, STARTUP_TIMEOUT)?;
        Ok(WasapiMicStream {
            window,
            running,
            alive,
            handle: Some(handle),
        })
    }

    fn device_info(&self) -> AudioSource {
        self.source.clone()
    }
}

/// An open WASAPI capture stream.
pub struct WasapiMicStream {
    window: Arc<Mutex<SampleWindow>>,
    running: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SampleStream for WasapiMicStream {
    fn read_frame(&mut self) -> Result<SampleFrame, MonitorError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(MonitorError::DeviceLost);
        }
        Ok(SampleFrame::Float32(self.window.lock().snapshot()))
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Mic capture thread panicked");
            }
        }
    }
}

impl Drop for WasapiMicStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Capture loop running on the dedicated thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Get capture device (default or by ID)
/// 3. Activate IAudioClient and initialize in shared mode
/// 4. Get IAudioCaptureClient service
/// 5. Register with MMCSS for real-time priority
/// 6. Start capture, report ready, poll for buffers until stopped
fn capture_loop(
    running: &AtomicBool,
    device_id: Option<&str>,
    window: &Mutex<SampleWindow>,
    ready: &mpsc::SyncSender<StartupReport>,
) -> Result<(), MonitorError> {
    let _com = ComScope::enter()?;

    unsafe {
        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
                MonitorError::Unknown(format!("failed to create enumerator: {}", e))
            })?;

        let device = match device_id {
            Some(id) => {
                let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                enumerator
                    .GetDevice(PCWSTR(wide_id.as_ptr()))
                    .map_err(|_| MonitorError::AccessUnavailable)?
            }
            None => enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| MonitorError::AccessUnavailable)?,
        };

        let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None).map_err(access_error)?;

        let mix_format_ptr = audio_client
            .GetMixFormat()
            .map_err(|e| MonitorError::Unknown(format!("GetMixFormat failed: {}", e)))?;
        let format = MixFormat::read(&*mix_format_ptr);

        let initialized = audio_client.Initialize(
            AUDCLNT_SHAREMODE_SHARED,
            AUDCLNT_STREAMFLAGS_NOPERSIST,
            BUFFER_DURATION,
            0,
            mix_format_ptr,
            None,
        );
        CoTaskMemFree(Some(mix_format_ptr as *const _));
        initialized.map_err(access_error)?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| MonitorError::Unknown(format!("GetService failed: {}", e)))?;

        if !running.load(Ordering::SeqCst) {
            // Startup timed out and the caller gave up on this thread.
            return Ok(());
        }

        let mut task_index: u32 = 0;
        let _mmcss = AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index);

        audio_client
            .Start()
            .map_err(|e| MonitorError::Unknown(format!("IAudioClient::Start failed: {}", e)))?;

        log::info!(
            "Mic capture started ({} Hz, {} ch, {}-bit)",
            format.sample_rate,
            format.channels,
            format.bits_per_sample
        );
        let _ = ready.try_send(Ok(()));

        let result = drain_until_stopped(running, &capture_client, &format, window);
        let _ = audio_client.Stop();
        result
    }
}

unsafe fn drain_until_stopped(
    running: &AtomicBool,
    capture_client: &IAudioCaptureClient,
    format: &MixFormat,
    window: &Mutex<SampleWindow>,
) -> Result<(), MonitorError> {
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(10));

        // Fails with AUDCLNT_E_DEVICE_INVALIDATED when the microphone is unplugged.
        let mut packet_length = capture_client
            .GetNextPacketSize()
            .map_err(|_| MonitorError::DeviceLost)?;

        while packet_length > 0 {
            let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
            let mut num_frames: u32 = 0;
            let mut flags: u32 = 0;

            capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(|_| MonitorError::DeviceLost)?;

            if num_frames > 0 && !buffer_ptr.is_null() {
                let total_samples = num_frames as usize * format.channels;
                let interleaved = if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                    vec![0.0f32; total_samples]
                } else {
                    format.to_f32(buffer_ptr, total_samples)
                };
                let mono = downmix_to_mono(&interleaved, format.channels);
                window.lock().write(&mono);
            }

            capture_client
                .ReleaseBuffer(num_frames)
                .map_err(|_| MonitorError::DeviceLost)?;

            packet_length = capture_client
                .GetNextPacketSize()
                .map_err(|_| MonitorError::DeviceLost)?;
        }
    }
    Ok(())
}

fn access_error(e: Error) -> MonitorError {
    if e.code() == windows::Win32::Foundation::E_ACCESSDENIED {
        MonitorError::AccessDenied
    } else {
        MonitorError::Unknown(format!("audio client setup failed: {}", e))
    }
}

/// The parts of the device mix format the capture loop needs.
struct MixFormat {
    sample_rate: u32,
    channels: usize,
    bits_per_sample: u16,
    is_float: bool,
}

impl MixFormat {
    unsafe fn read(format: &WAVEFORMATEX) -> Self {
        let tag = format.wFormatTag;
        let bits = format.wBitsPerSample;
        // Shared-mode mix formats are WAVE_FORMAT_EXTENSIBLE float in practice.
        let is_float =
            tag == WAVE_FORMAT_IEEE_FLOAT || (tag == WAVE_FORMAT_EXTENSIBLE && bits == 32);
        Self {
            sample_rate: format.nSamplesPerSec,
            channels: format.nChannels.max(1) as usize,
            bits_per_sample: bits,
            is_float,
        }
    }

    unsafe fn to_f32(&self, buffer: *const u8, total_samples: usize) -> Vec<f32> {
        match (self.is_float, self.bits_per_sample) {
            (true, 32) => std::slice::from_raw_parts(buffer as *const f32, total_samples).to_vec(),
            (false, 16) => std::slice::from_raw_parts(buffer as *const i16, total_samples)
                .iter()
                .map(|&s| s as f32 / 32768.0)
                .collect(),
            _ => vec![0.0; total_samples],
        }
    }
}
