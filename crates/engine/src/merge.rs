//! Read-then-merge step: fold one activity into the previous FanState.
//! Storage-free so the full field update can be checked in isolation.

use crate::streak::{self, StreakChange};
use crate::tiers::TierTable;
use chrono::{DateTime, Utc};
use fanscore_core::{Activity, ActivityType, FanState, Tier};

#[derive(Debug, Clone, PartialEq)]
pub struct MergedState {
    pub state: FanState,
    pub previous_tier: Tier,
    pub points_earned: u64,
    pub tier_changed: bool,
    pub streak: StreakChange,
}

pub fn merge_activity(
    previous: &FanState,
    activity: &Activity,
    points_earned: u64,
    tiers: &TierTable,
    now: DateTime<Utc>,
) -> MergedState {
    let mut state = previous.clone();

    state.points = previous.points.saturating_add(points_earned);

    let (streak_days, streak) = streak::advance(previous.last_activity_at, previous.streak_days, now);
    state.streak_days = streak_days;
    state.last_activity_at = Some(now);

    match activity.kind {
        ActivityType::SongPlay => {
            let listened = activity.value.floor() as u64;
            state.total_listening_time_ms = state.total_listening_time_ms.saturating_add(listened);
        }
        ActivityType::SongLike => state.songs_liked += 1,
        ActivityType::SongShare => state.songs_shared += 1,
        ActivityType::PlaylistCreate => state.playlists_created += 1,
        ActivityType::NftPurchase => state.nfts_purchased += 1,
        ActivityType::ConcertAttend => state.concerts_attended += 1,
    }

    let previous_tier = tiers.classify(previous.points);
    state.tier = tiers.classify(state.points);

    MergedState {
        tier_changed: previous_tier != state.tier,
        previous_tier,
        points_earned,
        streak,
        state,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 15, 0, 0).unwrap()
    }

    fn merge(previous: &FanState, kind: ActivityType, value: f64, points: u64) -> MergedState {
        merge_activity(previous, &Activity::new(kind, value), points, &TierTable::default(), now())
    }

    #[test]
    fn test_first_activity_from_default() {
        let merged = merge(&FanState::new("u1", "a1"), ActivityType::SongLike, 1.0, 10);
        assert_eq!(merged.state.points, 10);
        assert_eq!(merged.state.songs_liked, 1);
        assert_eq!(merged.state.streak_days, 1);
        assert_eq!(merged.streak, StreakChange::Started);
        assert_eq!(merged.state.last_activity_at, Some(now()));
        assert!(!merged.tier_changed);
    }

    #[test]
    fn test_song_play_updates_listening_time_only() {
        let merged = merge(&FanState::new("u1", "a1"), ActivityType::SongPlay, 95_000.0, 15);
        assert_eq!(merged.state.total_listening_time_ms, 95_000);
        assert_eq!(merged.state.songs_liked, 0);
        assert_eq!(merged.state.songs_shared, 0);
        assert_eq!(merged.state.playlists_created, 0);
        assert_eq!(merged.state.nfts_purchased, 0);
        assert_eq!(merged.state.concerts_attended, 0);
    }

    #[test]
    fn test_each_activity_increments_one_counter() {
        let base = FanState::new("u1", "a1");
        let cases = [
            (ActivityType::SongLike, 1, 0, 0, 0, 0),
            (ActivityType::SongShare, 0, 1, 0, 0, 0),
            (ActivityType::PlaylistCreate, 0, 0, 1, 0, 0),
            (ActivityType::NftPurchase, 0, 0, 0, 1, 0),
            (ActivityType::ConcertAttend, 0, 0, 0, 0, 1),
        ];
        for (kind, liked, shared, playlists, nfts, concerts) in cases {
            let s = merge(&base, kind, 1.0, 0).state;
            assert_eq!(
                (s.songs_liked, s.songs_shared, s.playlists_created, s.nfts_purchased, s.concerts_attended),
                (liked, shared, playlists, nfts, concerts),
                "{kind}"
            );
            assert_eq!(s.total_listening_time_ms, 0);
        }
    }

    #[test]
    fn test_share_crosses_into_silver() {
        let mut previous = FanState::new("u1", "a1");
        previous.points = 990;
        previous.streak_days = 3;
        previous.last_activity_at = Some(now() - Duration::days(1));

        let merged = merge(&previous, ActivityType::SongShare, 1.0, 15);
        assert_eq!(merged.state.points, 1005);
        assert_eq!(merged.previous_tier, Tier::Bronze);
        assert_eq!(merged.state.tier, Tier::Silver);
        assert!(merged.tier_changed);
        assert_eq!(merged.state.streak_days, 4);
    }

    #[test]
    fn test_identity_and_untouched_fields_preserved() {
        let mut previous = FanState::new("u1", "a1");
        previous.songs_liked = 7;
        previous.points = 3_000;
        previous.tier = Tier::Silver;
        let merged = merge(&previous, ActivityType::SongShare, 1.0, 15);
        assert_eq!(merged.state.user_id, "u1");
        assert_eq!(merged.state.artist_id, "a1");
        assert_eq!(merged.state.songs_liked, 7);
        assert_eq!(merged.state.points, 3_015);
    }

    #[test]
    fn test_points_never_decrease() {
        let mut previous = FanState::new("u1", "a1");
        previous.points = 42;
        let merged = merge(&previous, ActivityType::SongPlay, 1_000.0, 0);
        assert_eq!(merged.state.points, 42);
    }
}
