//! In-process store for tests and local development.
//!
//! One tokio mutex guards every table. A transaction holds the guard from
//! `begin` until commit or drop and works on a copy of the tables, so
//! dropping it discards every write.

use async_trait::async_trait;
use fanscore_core::{
    Achievement, ActivityLogEntry, FanError, FanResult, FanState, FanStore, FanTransaction,
    Milestone, UserAchievement, UserMilestoneProgress,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type PairKey = (String, String);

#[derive(Debug, Clone, Default)]
struct Tables {
    fan_states: HashMap<PairKey, FanState>,
    achievements: Vec<Achievement>,
    user_achievements: Vec<UserAchievement>,
    milestones: Vec<Milestone>,
    milestone_progress: Vec<UserMilestoneProgress>,
    activity_log: Vec<ActivityLogEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail with a retryable store error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

fn pair(user_id: &str, artist_id: &str) -> PairKey {
    (user_id.to_string(), artist_id.to_string())
}

#[async_trait]
impl FanStore for MemoryStore {
    async fn begin(&self, user_id: &str, artist_id: &str) -> FanResult<Box<dyn FanTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            key: pair(user_id, artist_id),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }

    async fn fan_state(&self, user_id: &str, artist_id: &str) -> FanResult<Option<FanState>> {
        let tables = self.tables.lock().await;
        Ok(tables.fan_states.get(&pair(user_id, artist_id)).cloned())
    }

    async fn activity_log(
        &self,
        user_id: &str,
        artist_id: &str,
        limit: u32,
    ) -> FanResult<Vec<ActivityLogEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .activity_log
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id && e.artist_id == artist_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn user_achievements(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> FanResult<Vec<UserAchievement>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .user_achievements
            .iter()
            .filter(|u| u.user_id == user_id && u.artist_id == artist_id)
            .cloned()
            .collect())
    }

    async fn milestone_progress(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> FanResult<Vec<UserMilestoneProgress>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .milestone_progress
            .iter()
            .filter(|p| p.user_id == user_id && p.artist_id == artist_id)
            .cloned()
            .collect())
    }

    async fn put_achievement(&self, achievement: &Achievement) -> FanResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.achievements.iter_mut().find(|a| a.id == achievement.id) {
            Some(existing) => *existing = achievement.clone(),
            None => tables.achievements.push(achievement.clone()),
        }
        Ok(())
    }

    async fn put_milestone(&self, milestone: &Milestone) -> FanResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.milestones.iter_mut().find(|m| m.id == milestone.id) {
            Some(existing) => *existing = milestone.clone(),
            None => tables.milestones.push(milestone.clone()),
        }
        Ok(())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    key: PairKey,
    fail_commit: bool,
}

impl MemoryTransaction {
    fn is_pair(&self, user_id: &str, artist_id: &str) -> bool {
        self.key.0 == user_id && self.key.1 == artist_id
    }
}

#[async_trait]
impl FanTransaction for MemoryTransaction {
    async fn lock_fan_state(&mut self) -> FanResult<Option<FanState>> {
        Ok(self.working.fan_states.get(&self.key).cloned())
    }

    async fn upsert_fan_state(&mut self, state: &FanState) -> FanResult<()> {
        self.working.fan_states.insert(self.key.clone(), state.clone());
        Ok(())
    }

    async fn achievement_catalog(&mut self) -> FanResult<Vec<Achievement>> {
        Ok(self
            .working
            .achievements
            .iter()
            .filter(|a| a.applies_to(&self.key.1))
            .cloned()
            .collect())
    }

    async fn unlocked_achievement_ids(&mut self) -> FanResult<HashSet<String>> {
        Ok(self
            .working
            .user_achievements
            .iter()
            .filter(|u| self.is_pair(&u.user_id, &u.artist_id))
            .map(|u| u.achievement_id.clone())
            .collect())
    }

    async fn insert_user_achievement(&mut self, unlock: &UserAchievement) -> FanResult<bool> {
        let exists = self.working.user_achievements.iter().any(|u| {
            u.user_id == unlock.user_id
                && u.achievement_id == unlock.achievement_id
                && u.artist_id == unlock.artist_id
        });
        if exists {
            return Ok(false);
        }
        self.working.user_achievements.push(unlock.clone());
        Ok(true)
    }

    async fn milestones_within(&mut self, points: u64) -> FanResult<Vec<Milestone>> {
        let mut within: Vec<Milestone> = self
            .working
            .milestones
            .iter()
            .filter(|m| m.required_points <= points)
            .cloned()
            .collect();
        within.sort_by_key(|m| m.required_points);
        Ok(within)
    }

    async fn completed_milestone_ids(&mut self) -> FanResult<HashSet<String>> {
        Ok(self
            .working
            .milestone_progress
            .iter()
            .filter(|p| p.is_completed && self.is_pair(&p.user_id, &p.artist_id))
            .map(|p| p.milestone_id.clone())
            .collect())
    }

    async fn complete_milestone(&mut self, progress: &UserMilestoneProgress) -> FanResult<bool> {
        let existing = self.working.milestone_progress.iter_mut().find(|p| {
            p.user_id == progress.user_id
                && p.milestone_id == progress.milestone_id
                && p.artist_id == progress.artist_id
        });
        match existing {
            Some(p) if p.is_completed => Ok(false),
            Some(p) => {
                p.is_completed = true;
                p.completed_at = progress.completed_at;
                Ok(true)
            }
            None => {
                self.working.milestone_progress.push(progress.clone());
                Ok(true)
            }
        }
    }

    async fn append_activity_log(&mut self, entry: &ActivityLogEntry) -> FanResult<()> {
        self.working.activity_log.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> FanResult<()> {
        if self.fail_commit {
            return Err(FanError::Store("commit rejected by memory store".to_string()));
        }
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
