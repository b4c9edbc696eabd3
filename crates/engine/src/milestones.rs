//! Milestone evaluator: point-total gates, completed at most once per fan pair.

use chrono::{DateTime, Utc};
use fanscore_core::{FanResult, FanState, FanTransaction, Milestone, UserMilestoneProgress};
use std::collections::HashSet;
use tracing::debug;

/// Reached milestones that have no completion record yet.
pub fn newly_reached<'a>(
    reached: &'a [Milestone],
    completed: &HashSet<String>,
    points: u64,
) -> Vec<&'a Milestone> {
    reached
        .iter()
        .filter(|m| m.required_points <= points)
        .filter(|m| !completed.contains(&m.id))
        .collect()
}

pub fn completion_record(
    milestone: &Milestone,
    state: &FanState,
    now: DateTime<Utc>,
) -> UserMilestoneProgress {
    UserMilestoneProgress {
        user_id: state.user_id.clone(),
        milestone_id: milestone.id.clone(),
        artist_id: state.artist_id.clone(),
        is_completed: true,
        completed_at: Some(now),
        reward_claimed: false,
    }
}

/// Mark every newly reached milestone complete. Returns titles, lowest threshold first.
pub async fn evaluate(
    tx: &mut dyn FanTransaction,
    state: &FanState,
    now: DateTime<Utc>,
) -> FanResult<Vec<String>> {
    let reached = tx.milestones_within(state.points).await?;
    if reached.is_empty() {
        return Ok(Vec::new());
    }
    let completed = tx.completed_milestone_ids().await?;

    let mut titles = Vec::new();
    for milestone in newly_reached(&reached, &completed, state.points) {
        if tx
            .complete_milestone(&completion_record(milestone, state, now))
            .await?
        {
            debug!(
                user_id = %state.user_id,
                artist_id = %state.artist_id,
                milestone = %milestone.id,
                "Milestone reached"
            );
            titles.push(milestone.title.clone());
        }
    }
    Ok(titles)
}
