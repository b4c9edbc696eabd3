//! Notification decision and audit log entry construction.

use crate::merge::MergedState;
use chrono::{DateTime, Utc};
use fanscore_core::{Activity, ActivityLogEntry, NotificationIntent, NotificationKind};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// One `tier_upgrade` intent when the tier changed, then one `achievement`
/// intent per unlocked title, in unlock order.
pub fn decide(
    merged: &MergedState,
    achievements: &[String],
    channels: &[String],
) -> Vec<NotificationIntent> {
    let state = &merged.state;
    let mut intents = Vec::with_capacity(achievements.len() + 1);

    if merged.tier_changed {
        intents.push(NotificationIntent {
            kind: NotificationKind::TierUpgrade,
            user_id: state.user_id.clone(),
            title: "Tier Upgrade!".to_string(),
            message: format!("You've reached {} tier!", state.tier),
            data: json!({
                "artistId": state.artist_id,
                "previousTier": merged.previous_tier,
                "newTier": state.tier,
            }),
            channels: channels.to_vec(),
        });
    }

    for title in achievements {
        intents.push(NotificationIntent {
            kind: NotificationKind::Achievement,
            user_id: state.user_id.clone(),
            title: "Achievement Unlocked!".to_string(),
            message: title.clone(),
            data: json!({
                "artistId": state.artist_id,
                "achievement": title,
            }),
            channels: channels.to_vec(),
        });
    }

    intents
}

/// Audit row for one processed event. Activity metadata is kept and the
/// tier and unlock deltas are layered on top of it.
pub fn log_entry(
    merged: &MergedState,
    activity: &Activity,
    achievements: &[String],
    milestones: &[String],
    now: DateTime<Utc>,
) -> ActivityLogEntry {
    let mut data = match &activity.metadata {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    data.insert("previous_tier".into(), json!(merged.previous_tier));
    data.insert("new_tier".into(), json!(merged.state.tier));
    data.insert("achievements".into(), json!(achievements));
    data.insert("milestones".into(), json!(milestones));

    ActivityLogEntry {
        id: Uuid::new_v4(),
        user_id: merged.state.user_id.clone(),
        artist_id: merged.state.artist_id.clone(),
        activity_type: activity.kind,
        points_earned: merged.points_earned,
        tier_updated: merged.tier_changed,
        achievement_unlocked: achievements.first().cloned(),
        data: Value::Object(data),
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streak::StreakChange;
    use fanscore_core::{ActivityType, FanState, Tier};

    fn merged(tier_changed: bool) -> MergedState {
        let mut state = FanState::new("u1", "a1");
        state.points = 1005;
        state.tier = if tier_changed { Tier::Silver } else { Tier::Bronze };
        MergedState {
            state,
            previous_tier: Tier::Bronze,
            points_earned: 15,
            tier_changed,
            streak: StreakChange::Continued,
        }
    }

    fn channels() -> Vec<String> {
        vec!["push".into(), "in_app".into()]
    }

    #[test]
    fn test_tier_upgrade_first_then_achievements() {
        let titles = vec!["Sharer".to_string(), "Silver Fan".to_string()];
        let intents = decide(&merged(true), &titles, &channels());
        assert_eq!(intents.len(), 3);
        assert_eq!(intents[0].kind, NotificationKind::TierUpgrade);
        assert_eq!(intents[0].message, "You've reached Silver tier!");
        assert_eq!(intents[0].data["previousTier"], "Bronze");
        assert_eq!(intents[1].kind, NotificationKind::Achievement);
        assert_eq!(intents[1].message, "Sharer");
        assert_eq!(intents[2].message, "Silver Fan");
        assert_eq!(intents[2].channels, channels());
    }

    #[test]
    fn test_no_intents_without_changes() {
        assert!(decide(&merged(false), &[], &channels()).is_empty());
    }

    #[test]
    fn test_log_entry_merges_metadata() {
        let mut activity = Activity::new(ActivityType::SongShare, 1.0);
        activity.metadata = Some(json!({"songId": "s-42", "platform": "ios"}));
        let entry = log_entry(
            &merged(true),
            &activity,
            &["Sharer".to_string()],
            &["First Thousand".to_string()],
            Utc::now(),
        );
        assert_eq!(entry.activity_type, ActivityType::SongShare);
        assert_eq!(entry.points_earned, 15);
        assert!(entry.tier_updated);
        assert_eq!(entry.achievement_unlocked.as_deref(), Some("Sharer"));
        assert_eq!(entry.data["songId"], "s-42");
        assert_eq!(entry.data["previous_tier"], "Bronze");
        assert_eq!(entry.data["new_tier"], "Silver");
        assert_eq!(entry.data["milestones"][0], "First Thousand");
    }

    #[test]
    fn test_log_entry_without_metadata() {
        let entry = log_entry(
            &merged(false),
            &Activity::new(ActivityType::SongLike, 1.0),
            &[],
            &[],
            Utc::now(),
        );
        assert!(entry.achievement_unlocked.is_none());
        assert_eq!(entry.data["achievements"], json!([]));
    }
}
