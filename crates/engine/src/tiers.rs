//! Tier classifier over ordered, non-overlapping point ranges.

use fanscore_core::config::{ScoringConfig, TierThresholdsConfig};
use fanscore_core::{FanResult, NextTierProgress, Tier};

/// Lower bound of each tier, indexed by `Tier::rank`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    floors: [u64; 5],
}

impl TierTable {
    pub fn new(thresholds: &TierThresholdsConfig) -> FanResult<Self> {
        Ok(Self {
            floors: thresholds.floors()?,
        })
    }

    pub fn from_scoring(config: &ScoringConfig) -> FanResult<Self> {
        Self::new(&config.tiers)
    }

    pub fn floor(&self, tier: Tier) -> u64 {
        self.floors[tier.rank()]
    }

    pub fn classify(&self, points: u64) -> Tier {
        Tier::ALL
            .iter()
            .rev()
            .find(|t| points >= self.floor(**t))
            .copied()
            .unwrap_or(Tier::Bronze)
    }

    pub fn progress(&self, points: u64) -> NextTierProgress {
        let tier = self.classify(points);
        let Some(next) = tier.next() else {
            return NextTierProgress {
                current: points,
                required: points,
                percentage: 100,
            };
        };

        let floor = self.floor(tier);
        let current = points - floor;
        let required = self.floor(next) - floor;
        let percentage = ((current as f64 / required as f64) * 100.0).round().min(100.0) as u8;

        NextTierProgress {
            current,
            required,
            percentage,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            floors: [0, 1_000, 5_000, 15_000, 40_000],
        }
    }
}
