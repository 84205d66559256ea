use serde::{Deserialize, Serialize};

use crate::models::audio_models::SampleFrame;
use crate::models::reading::LoudnessReading;
use crate::processing::tiers::TierBands;

/// Floor added to the RMS before `log10`, keeps silence finite.
pub const DEFAULT_EPSILON: f64 = 1e-5;

/// Shift from dBFS (0 at full scale) onto the published scale.
pub const DEFAULT_OFFSET_DB: f64 = 120.0;

/// Lowest published magnitude. A silent room reads here.
pub const DEFAULT_FLOOR: u8 = 50;

/// Highest published magnitude. Shouting reads here.
pub const DEFAULT_CEILING: u8 = 100;

/// Decibel conversion knobs.
///
/// The published scale deliberately compresses ambient noise into a narrow
/// band: `clamp(20 * log10(rms + epsilon) + offset_db, floor, ceiling)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub epsilon: f64,
    pub offset_db: f64,
    pub floor: u8,
    pub ceiling: u8,
}

impl Calibration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(format!("epsilon must be positive, got {}", self.epsilon));
        }
        if !self.offset_db.is_finite() {
            return Err("offset must be finite".into());
        }
        if self.floor >= self.ceiling {
            return Err(format!("floor {} must be below ceiling {}", self.floor, self.ceiling));
        }
        Ok(())
    }

    /// Map an RMS value onto the published integer scale.
    pub fn magnitude(&self, rms: f64) -> u8 {
        let rms = if rms.is_finite() { rms.max(0.0) } else { 0.0 };
        let level = 20.0 * (rms + self.epsilon).log10() + self.offset_db;
        let clamped = level.clamp(f64::from(self.floor), f64::from(self.ceiling));
        clamped.round() as u8
    }

    /// Position of `magnitude` between floor (0.0) and ceiling (1.0), for bar graphs.
    pub fn fill_ratio(&self, magnitude: u8) -> f64 {
        let span = f64::from(self.ceiling) - f64::from(self.floor);
        if span <= 0.0 {
            return 0.0;
        }
        ((f64::from(magnitude) - f64::from(self.floor)) / span).clamp(0.0, 1.0)
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            offset_db: DEFAULT_OFFSET_DB,
            floor: DEFAULT_FLOOR,
            ceiling: DEFAULT_CEILING,
        }
    }
}

/// Normalize a frame to `[-1.0, 1.0]` centered at zero.
///
/// Non-finite float samples count as silence.
pub fn normalize(frame: &SampleFrame) -> Vec<f64> {
    match frame {
        SampleFrame::Unsigned8(samples) => samples
            .iter()
            .map(|&s| (f64::from(s) - 128.0) / 128.0)
            .collect(),
        SampleFrame::Signed16(samples) => samples
            .iter()
            .map(|&s| f64::from(s) / 32768.0)
            .collect(),
        SampleFrame::Float32(samples) => samples
            .iter()
            .map(|&s| {
                if s.is_finite() {
                    f64::from(s).clamp(-1.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect(),
    }
}

/// Compute RMS level of normalized samples (0.0–1.0).
pub fn rms_level(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Compute peak absolute level of normalized samples.
pub fn peak_level(samples: &[f64]) -> f64 {
    samples.iter().map(|s| s.abs()).fold(0.0f64, f64::max)
}

/// Converts raw frames into published loudness readings.
///
/// Pure and stateless between frames; one call per sampling tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessEstimator {
    calibration: Calibration,
    bands: TierBands,
}

impl LoudnessEstimator {
    pub fn new(calibration: Calibration, bands: TierBands) -> Self {
        Self { calibration, bands }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn bands(&self) -> &TierBands {
        &self.bands
    }

    /// Frame → normalize → RMS → dB → calibrate/clamp → round → tier.
    pub fn estimate(&self, frame: &SampleFrame) -> LoudnessReading {
        let normalized = normalize(frame);
        let rms = rms_level(&normalized);
        let magnitude = self.calibration.magnitude(rms);
        LoudnessReading::new(magnitude, self.bands.tier_for(magnitude))
    }
}

impl Default for LoudnessEstimator {
    fn default() -> Self {
        Self::new(Calibration::default(), TierBands::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::SampleEncoding;
    use crate::models::reading::SeverityTier;
    use approx::assert_relative_eq;

    fn square(amplitude: f32, len: usize) -> Vec<f32> {
        (0..len).map(|i| if i % 2 == 0 { amplitude } else { -amplitude }).collect()
    }

    #[test]
    fn normalize_unsigned_bytes_around_128() {
        let n = normalize(&SampleFrame::Unsigned8(vec![128, 0, 255, 192]));
        assert_relative_eq!(n[0], 0.0);
        assert_relative_eq!(n[1], -1.0);
        assert_relative_eq!(n[2], 127.0 / 128.0);
        assert_relative_eq!(n[3], 0.5);
    }

    #[test]
    fn normalize_signed_and_float() {
        let n = normalize(&SampleFrame::Signed16(vec![0, i16::MIN, 16384]));
        assert_relative_eq!(n[0], 0.0);
        assert_relative_eq!(n[1], -1.0);
        assert_relative_eq!(n[2], 0.5);

        let n = normalize(&SampleFrame::Float32(vec![2.0, -3.0, f32::NAN, f32::INFINITY]));
        assert_eq!(n, vec![1.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn rms_level_silence() {
        assert_eq!(rms_level(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(rms_level(&[]), 0.0);
    }

    #[test]
    fn rms_level_full_scale() {
        assert_relative_eq!(rms_level(&[1.0, -1.0, 1.0]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn peak_level_basic() {
        assert_relative_eq!(peak_level(&[0.1, -0.5, 0.3]), 0.5);
    }

    const ENCODINGS: [SampleEncoding; 3] = [
        SampleEncoding::Unsigned8,
        SampleEncoding::Signed16,
        SampleEncoding::Float32,
    ];

    #[test]
    fn silence_pins_to_floor() {
        let estimator = LoudnessEstimator::default();
        for encoding in ENCODINGS {
            let reading = estimator.estimate(&SampleFrame::silence(encoding, 256));
            assert_eq!(reading.magnitude, DEFAULT_FLOOR);
            assert_eq!(reading.tier, SeverityTier::Quiet);
        }
    }

    #[test]
    fn full_scale_pins_to_ceiling() {
        let estimator = LoudnessEstimator::default();
        for encoding in ENCODINGS {
            let frame = SampleFrame::from_normalized(encoding, &square(1.0, 256));
            let reading = estimator.estimate(&frame);
            assert_eq!(reading.magnitude, DEFAULT_CEILING);
            assert_eq!(reading.tier, SeverityTier::Critical);
        }
    }

    #[test]
    fn mid_level_follows_log_scale() {
        // 0.001 RMS is -60 dBFS → 60 after the +120 offset.
        let estimator = LoudnessEstimator::default();
        let reading = estimator.estimate(&SampleFrame::Float32(square(0.001, 256)));
        assert_eq!(reading.magnitude, 60);
        assert_eq!(reading.tier, SeverityTier::Quiet);

        // 0.003 RMS ≈ -50.5 dBFS → 70.
        let reading = estimator.estimate(&SampleFrame::Float32(square(0.003, 256)));
        assert_eq!(reading.magnitude, 70);
        assert_eq!(reading.tier, SeverityTier::Moderate);
    }

    #[test]
    fn magnitude_never_leaves_bounds() {
        let calibration = Calibration::default();
        for rms in [0.0, 1e-12, 1e-6, 0.01, 0.5, 1.0, 10.0, f64::NAN, f64::INFINITY, -1.0] {
            let m = calibration.magnitude(rms);
            assert!((calibration.floor..=calibration.ceiling).contains(&m), "rms {} → {}", rms, m);
        }
    }

    #[test]
    fn empty_frame_reads_floor() {
        let reading = LoudnessEstimator::default().estimate(&SampleFrame::Float32(Vec::new()));
        assert_eq!(reading.magnitude, DEFAULT_FLOOR);
    }

    #[test]
    fn knobs_are_independent() {
        let calibration = Calibration {
            offset_db: 100.0,
            floor: 0,
            ceiling: 100,
            ..Default::default()
        };
        // 0.1 RMS is -20 dBFS → 80 with a +100 offset.
        assert_eq!(calibration.magnitude(0.1), 80);

        let calibration = Calibration {
            epsilon: 1e-3,
            floor: 0,
            ..Default::default()
        };
        // Silence reads 20*log10(1e-3) + 120 = 60 with the coarser floor.
        assert_eq!(calibration.magnitude(0.0), 60);
    }

    #[test]
    fn calibration_validation() {
        assert!(Calibration::default().validate().is_ok());
        assert!(Calibration { epsilon: 0.0, ..Default::default() }.validate().is_err());
        assert!(Calibration { offset_db: f64::NAN, ..Default::default() }.validate().is_err());
        assert!(Calibration { floor: 100, ceiling: 100, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn fill_ratio_spans_floor_to_ceiling() {
        let calibration = Calibration::default();
        assert_relative_eq!(calibration.fill_ratio(50), 0.0);
        assert_relative_eq!(calibration.fill_ratio(75), 0.5);
        assert_relative_eq!(calibration.fill_ratio(100), 1.0);
        assert_relative_eq!(calibration.fill_ratio(0), 0.0);
    }
}
