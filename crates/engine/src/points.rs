//! Point rule table: activity + magnitude to non-negative points.

use fanscore_core::config::PointRulesConfig;
use fanscore_core::{Activity, ActivityType};

#[derive(Debug, Clone)]
pub struct PointRules {
    config: PointRulesConfig,
}

impl PointRules {
    pub fn new(config: &PointRulesConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Points granted for one validated activity.
    pub fn points_for(&self, activity: &Activity) -> u64 {
        let c = &self.config;
        match activity.kind {
            ActivityType::SongPlay => {
                let blocks = (activity.value / c.song_play_block_ms as f64).floor() as u64;
                blocks
                    .saturating_mul(c.song_play_points_per_block)
                    .min(c.song_play_max)
            }
            ActivityType::SongLike => c.song_like,
            ActivityType::SongShare => c.song_share,
            ActivityType::PlaylistCreate => c.playlist_create,
            ActivityType::NftPurchase => {
                // Fractional prices earn the floor of price * rate.
                let raw = (activity.value * c.nft_purchase_per_unit as f64).floor();
                (raw as u64).min(c.nft_purchase_max)
            }
            ActivityType::ConcertAttend => c.concert_attend,
        }
    }
}

impl Default for PointRules {
    fn default() -> Self {
        Self::new(&PointRulesConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(kind: ActivityType, value: f64) -> u64 {
        PointRules::default().points_for(&Activity::new(kind, value))
    }

    #[test]
    fn test_song_play_blocks() {
        assert_eq!(points(ActivityType::SongPlay, 0.0), 0);
        assert_eq!(points(ActivityType::SongPlay, 29_999.0), 0);
        assert_eq!(points(ActivityType::SongPlay, 30_000.0), 5);
        assert_eq!(points(ActivityType::SongPlay, 95_000.0), 15);
    }

    #[test]
    fn test_song_play_capped_at_25() {
        assert_eq!(points(ActivityType::SongPlay, 150_000.0), 25);
        assert_eq!(points(ActivityType::SongPlay, 3_600_000.0), 25);
    }

    #[test]
    fn test_flat_rules() {
        assert_eq!(points(ActivityType::SongLike, 1.0), 10);
        assert_eq!(points(ActivityType::SongShare, 1.0), 15);
        assert_eq!(points(ActivityType::PlaylistCreate, 1.0), 50);
        assert_eq!(points(ActivityType::ConcertAttend, 0.0), 500);
    }

    #[test]
    fn test_nft_purchase_scaled_and_capped() {
        assert_eq!(points(ActivityType::NftPurchase, 3.0), 300);
        assert_eq!(points(ActivityType::NftPurchase, 2.5), 250);
        assert_eq!(points(ActivityType::NftPurchase, 12.0), 1000);
    }

    #[test]
    fn test_custom_rules() {
        let config = PointRulesConfig {
            song_like: 3,
            song_play_max: 100,
            ..Default::default()
        };
        let rules = PointRules::new(&config);
        assert_eq!(rules.points_for(&Activity::new(ActivityType::SongLike, 1.0)), 3);
        assert_eq!(
            rules.points_for(&Activity::new(ActivityType::SongPlay, 600_000.0)),
            100
        );
    }
}
