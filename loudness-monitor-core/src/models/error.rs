use thiserror::Error;

/// Errors that can occur while acquiring or sampling the microphone.
///
/// None of these are fatal to the host application. Access errors leave the
/// monitor idle; `DeviceLost` tears the open session down.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("microphone access denied")]
    AccessDenied,

    #[error("microphone unavailable")]
    AccessUnavailable,

    #[error("capture device lost")]
    DeviceLost,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl MonitorError {
    /// Whether the host refused or could not provide microphone access.
    pub fn is_access_error(&self) -> bool {
        matches!(self, Self::AccessDenied | Self::AccessUnavailable)
    }
}
