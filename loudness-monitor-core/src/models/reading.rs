use serde::{Deserialize, Serialize};

/// Discrete loudness band used to pick a visual treatment.
///
/// Ordered from quietest to loudest, so `Quiet < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    #[default]
    Quiet,
    Moderate,
    Loud,
    Critical,
}

impl SeverityTier {
    pub const ALL: [SeverityTier; 4] = [Self::Quiet, Self::Moderate, Self::Loud, Self::Critical];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Moderate => "moderate",
            Self::Loud => "loud",
            Self::Critical => "critical",
        }
    }

    pub(crate) fn to_bits(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Moderate,
            2 => Self::Loud,
            3 => Self::Critical,
            _ => Self::Quiet,
        }
    }
}

/// Latest loudness snapshot published to the presentation layer.
///
/// Estimated readings always fall inside the calibrated `[floor, ceiling]`
/// interval. [`LoudnessReading::IDLE`] (`0 / Quiet`) marks "not measuring".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoudnessReading {
    pub magnitude: u8,
    pub tier: SeverityTier,
}

impl LoudnessReading {
    pub const IDLE: LoudnessReading = LoudnessReading {
        magnitude: 0,
        tier: SeverityTier::Quiet,
    };

    pub fn new(magnitude: u8, tier: SeverityTier) -> Self {
        Self { magnitude, tier }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::IDLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(SeverityTier::Quiet < SeverityTier::Moderate);
        assert!(SeverityTier::Moderate < SeverityTier::Loud);
        assert!(SeverityTier::Loud < SeverityTier::Critical);
    }

    #[test]
    fn tier_bits_survive_packing() {
        for tier in SeverityTier::ALL {
            assert_eq!(SeverityTier::from_bits(tier.to_bits()), tier);
        }
    }

    #[test]
    fn idle_reading_is_default() {
        assert_eq!(LoudnessReading::default(), LoudnessReading::IDLE);
        assert!(LoudnessReading::IDLE.is_idle());
        assert!(!LoudnessReading::new(50, SeverityTier::Quiet).is_idle());
    }

    #[test]
    fn reading_serializes_with_lowercase_tier() {
        let reading = LoudnessReading::new(93, SeverityTier::Critical);
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(json, r#"{"magnitude":93,"tier":"critical"}"#);
    }
}
