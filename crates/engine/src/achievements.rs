//! Achievement evaluator. Achievements are monotonic gates: once a
//! (user, achievement, artist) row exists it is never re-evaluated or revoked.

use chrono::{DateTime, Utc};
use fanscore_core::{Achievement, Activity, FanResult, FanState, FanTransaction, UserAchievement};
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

/// Catalog entries that apply to the pair, are not yet unlocked, and whose criterion holds.
pub fn newly_unlocked<'a>(
    catalog: &'a [Achievement],
    unlocked: &HashSet<String>,
    state: &FanState,
) -> Vec<&'a Achievement> {
    catalog
        .iter()
        .filter(|a| a.applies_to(&state.artist_id))
        .filter(|a| !unlocked.contains(&a.id))
        .filter(|a| a.unlock_criteria.is_met(state))
        .collect()
}

pub fn unlock_record(
    achievement: &Achievement,
    state: &FanState,
    activity: &Activity,
    now: DateTime<Utc>,
) -> UserAchievement {
    UserAchievement {
        user_id: state.user_id.clone(),
        achievement_id: achievement.id.clone(),
        artist_id: state.artist_id.clone(),
        unlocked_at: now,
        progress_data: json!({
            "unlocked_by": activity.kind,
            "unlocked_value": achievement.unlock_criteria.observed(state),
        }),
    }
}

/// Evaluate the catalog inside the pair's transaction and write new unlocks.
/// Returns unlocked titles in catalog order.
pub async fn evaluate(
    tx: &mut dyn FanTransaction,
    state: &FanState,
    activity: &Activity,
    now: DateTime<Utc>,
) -> FanResult<Vec<String>> {
    let catalog = tx.achievement_catalog().await?;
    let unlocked = tx.unlocked_achievement_ids().await?;

    let mut titles = Vec::new();
    for achievement in newly_unlocked(&catalog, &unlocked, state) {
        let record = unlock_record(achievement, state, activity, now);
        if tx.insert_user_achievement(&record).await? {
            debug!(
                user_id = %state.user_id,
                artist_id = %state.artist_id,
                achievement = %achievement.id,
                "Achievement unlocked"
            );
            titles.push(achievement.title.clone());
        }
    }
    Ok(titles)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fanscore_core::{ActivityType, FanCounter, Tier, UnlockCriterion};

    fn achievement(id: &str, artist: Option<&str>, criteria: UnlockCriterion) -> Achievement {
        Achievement {
            id: id.into(),
            artist_id: artist.map(Into::into),
            title: format!("Title {id}"),
            description: None,
            unlock_criteria: criteria,
        }
    }

    fn catalog() -> Vec<Achievement> {
        vec![
            achievement("likes-5", None, UnlockCriterion::SongsLiked { value: 5 }),
            achievement("silver", None, UnlockCriterion::TierReached { value: Tier::Silver }),
            achievement("a1-pts", Some("a1"), UnlockCriterion::PointsTotal { value: 1000 }),
            achievement("a2-pts", Some("a2"), UnlockCriterion::PointsTotal { value: 1000 }),
            achievement(
                "shares-2",
                None,
                UnlockCriterion::ActivityCount {
                    activity_type: FanCounter::SongsShared,
                    value: 2,
                },
            ),
        ]
    }

    fn state() -> FanState {
        let mut s = FanState::new("u1", "a1");
        s.points = 1005;
        s.tier = Tier::Silver;
        s.songs_liked = 5;
        s.songs_shared = 1;
        s
    }

    #[test]
    fn test_newly_unlocked_filters_scope_and_criteria() {
        let catalog = catalog();
        let ids: Vec<_> = newly_unlocked(&catalog, &HashSet::new(), &state())
            .into_iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["likes-5", "silver", "a1-pts"]);
    }

    #[test]
    fn test_already_unlocked_skipped() {
        let catalog = catalog();
        let unlocked: HashSet<String> = ["likes-5".to_string(), "silver".to_string()].into();
        let ids: Vec<_> = newly_unlocked(&catalog, &unlocked, &state())
            .into_iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1-pts"]);
    }

    #[test]
    fn test_unlock_record_provenance() {
        let catalog = catalog();
        let activity = Activity::new(ActivityType::SongShare, 1.0);
        let record = unlock_record(&catalog[2], &state(), &activity, Utc::now());
        assert_eq!(record.achievement_id, "a1-pts");
        assert_eq!(record.artist_id, "a1");
        assert_eq!(record.progress_data["unlocked_by"], "song_share");
        assert_eq!(record.progress_data["unlocked_value"], 1005);
    }
}
