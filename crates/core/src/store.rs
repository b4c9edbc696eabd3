//! Transactional row store seam.
//!
//! A `FanTransaction` is scoped to one fan pair and holds that pair's write
//! lock in the backing store from `lock_fan_state` until `commit` or drop.
//! Dropping a transaction without committing rolls back every write made
//! through it, so a failed event leaves no partial state behind.

use crate::activity::ActivityLogEntry;
use crate::error::FanResult;
use crate::fan::FanState;
use crate::rewards::{Achievement, Milestone, UserAchievement, UserMilestoneProgress};
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait FanStore: Send + Sync {
    /// Open a write transaction for one fan pair.
    async fn begin(&self, user_id: &str, artist_id: &str) -> FanResult<Box<dyn FanTransaction>>;

    async fn fan_state(&self, user_id: &str, artist_id: &str) -> FanResult<Option<FanState>>;

    /// Newest entries first.
    async fn activity_log(
        &self,
        user_id: &str,
        artist_id: &str,
        limit: u32,
    ) -> FanResult<Vec<ActivityLogEntry>>;

    async fn user_achievements(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> FanResult<Vec<UserAchievement>>;

    async fn milestone_progress(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> FanResult<Vec<UserMilestoneProgress>>;

    /// Insert or replace a catalog achievement by id.
    async fn put_achievement(&self, achievement: &Achievement) -> FanResult<()>;

    /// Insert or replace a catalog milestone by id.
    async fn put_milestone(&self, milestone: &Milestone) -> FanResult<()>;
}

#[async_trait]
pub trait FanTransaction: Send {
    /// Acquire the pair's write lock and read its current state.
    async fn lock_fan_state(&mut self) -> FanResult<Option<FanState>>;

    /// Write the full aggregate in one statement keyed by (user, artist).
    async fn upsert_fan_state(&mut self, state: &FanState) -> FanResult<()>;

    /// Achievements scoped to this pair's artist plus global ones.
    async fn achievement_catalog(&mut self) -> FanResult<Vec<Achievement>>;

    async fn unlocked_achievement_ids(&mut self) -> FanResult<HashSet<String>>;

    /// Returns false when the row already existed and nothing was written.
    async fn insert_user_achievement(&mut self, unlock: &UserAchievement) -> FanResult<bool>;

    /// Milestones with `required_points <= points`, lowest first.
    async fn milestones_within(&mut self, points: u64) -> FanResult<Vec<Milestone>>;

    async fn completed_milestone_ids(&mut self) -> FanResult<HashSet<String>>;

    /// Mark a milestone complete. Returns false when it was already complete.
    async fn complete_milestone(&mut self, progress: &UserMilestoneProgress) -> FanResult<bool>;

    async fn append_activity_log(&mut self, entry: &ActivityLogEntry) -> FanResult<()>;

    async fn commit(self: Box<Self>) -> FanResult<()>;
}
