use serde::{Deserialize, Serialize};

use crate::models::reading::SeverityTier;
use crate::processing::loudness::{DEFAULT_CEILING, DEFAULT_FLOOR};

/// Widths of the Quiet, Moderate and Loud bands as fractions of the span.
/// Critical takes the remaining 15%.
pub const DEFAULT_TIER_FRACTIONS: [f64; 3] = [0.30, 0.30, 0.25];

/// Integer cut points partitioning `[floor, ceiling]` into four tiers.
///
/// ```text
/// floor ─ Quiet ─▶ moderate_from ─ Moderate ─▶ loud_from
///       ─ Loud ─▶ critical_from ─ Critical ─ ceiling
/// ```
///
/// Each band includes its lower edge, so a magnitude sitting exactly on a cut
/// point belongs to the higher tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBands {
    pub moderate_from: u8,
    pub loud_from: u8,
    pub critical_from: u8,
}

impl TierBands {
    /// Explicit cut points. Must be strictly ascending.
    pub fn new(moderate_from: u8, loud_from: u8, critical_from: u8) -> Result<Self, String> {
        if !(moderate_from < loud_from && loud_from < critical_from) {
            return Err(format!(
                "tier cut points must ascend: {} < {} < {}",
                moderate_from, loud_from, critical_from
            ));
        }
        Ok(Self {
            moderate_from,
            loud_from,
            critical_from,
        })
    }

    /// Derive cut points from cumulative band fractions of `[floor, ceiling]`.
    ///
    /// A real-valued cut at 92.5 starts the higher band at 93, the first
    /// integer on or above it.
    pub fn from_fractions(floor: u8, ceiling: u8, fractions: [f64; 3]) -> Result<Self, String> {
        if floor >= ceiling {
            return Err(format!("floor {} must be below ceiling {}", floor, ceiling));
        }
        if fractions.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(format!("tier fractions must be positive: {:?}", fractions));
        }
        if fractions.iter().sum::<f64>() >= 1.0 {
            return Err(format!("tier fractions must leave room for critical: {:?}", fractions));
        }

        let bands = Self::derive(floor, ceiling, fractions);
        if bands.moderate_from <= floor || bands.critical_from > ceiling {
            return Err(format!("tier bands collapse within [{}, {}]", floor, ceiling));
        }
        Self::new(bands.moderate_from, bands.loud_from, bands.critical_from)
    }

    fn derive(floor: u8, ceiling: u8, fractions: [f64; 3]) -> Self {
        let span = f64::from(ceiling) - f64::from(floor);
        let cut = |cumulative: f64| -> u8 {
            let offset = (cumulative * span - 1e-9).ceil().max(0.0);
            (f64::from(floor) + offset).min(255.0) as u8
        };
        Self {
            moderate_from: cut(fractions[0]),
            loud_from: cut(fractions[0] + fractions[1]),
            critical_from: cut(fractions[0] + fractions[1] + fractions[2]),
        }
    }

    /// Tier of a magnitude. Pure and total; anything below the first cut is Quiet.
    pub fn tier_for(&self, magnitude: u8) -> SeverityTier {
        if magnitude >= self.critical_from {
            SeverityTier::Critical
        } else if magnitude >= self.loud_from {
            SeverityTier::Loud
        } else if magnitude >= self.moderate_from {
            SeverityTier::Moderate
        } else {
            SeverityTier::Quiet
        }
    }
}

impl Default for TierBands {
    fn default() -> Self {
        Self::derive(DEFAULT_FLOOR, DEFAULT_CEILING, DEFAULT_TIER_FRACTIONS)
    }
}
