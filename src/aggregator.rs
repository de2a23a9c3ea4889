//! Reduces a signal list to one overall confidence tier.
use crate::signal::{ConfidenceTier, Signal};

/// Combined weight needed for [`ConfidenceTier::VeryHigh`].
pub const VERY_HIGH_THRESHOLD: u32 = 12;
/// Combined weight needed for [`ConfidenceTier::High`].
pub const HIGH_THRESHOLD: u32 = 8;
/// Combined weight needed for [`ConfidenceTier::Medium`].
pub const MEDIUM_THRESHOLD: u32 = 4;

/// Sum of all signal weights.
pub fn total_weight(signals: &[Signal]) -> u32 {
    signals.iter().map(|s| s.weight()).sum()
}

/// Map a combined weight onto a tier, checking thresholds from the highest
/// down. Anything under the medium threshold is low, including zero.
pub fn tier_for_weight(weight: u32) -> ConfidenceTier {
    if weight >= VERY_HIGH_THRESHOLD {
        ConfidenceTier::VeryHigh
    } else if weight >= HIGH_THRESHOLD {
        ConfidenceTier::High
    } else if weight >= MEDIUM_THRESHOLD {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

pub fn aggregate(signals: &[Signal]) -> ConfidenceTier {
    tier_for_weight(total_weight(signals))
}
