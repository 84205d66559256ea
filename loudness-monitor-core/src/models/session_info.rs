use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audio_models::AudioSource;

/// Public description of the currently open capture session.
///
/// Serializable for JSON export to a UI bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub device: AudioSource,
    pub sample_period_ms: u64,
    pub window_size: usize,
}

impl SessionInfo {
    pub fn new(device: AudioSource, sample_period_ms: u64, window_size: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
            device,
            sample_period_ms,
            window_size,
        }
    }
}
