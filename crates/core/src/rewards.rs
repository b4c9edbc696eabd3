//! Achievement and milestone catalogs plus the per-fan unlock records.
//!
//! Catalog entries are static configuration. Their field names are snake_case
//! because they are loaded from TOML catalog files through the `config` crate.

use crate::error::{FanError, FanResult};
use crate::fan::{FanCounter, FanState, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;

// ─── Achievements ───────────────────────────────────────────────────────────

/// Typed unlock predicate evaluated against a fresh FanState.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnlockCriterion {
    PointsTotal { value: u64 },
    /// Listening time in milliseconds.
    ListeningTime { value: u64 },
    SongsLiked { value: u64 },
    StreakDays { value: u32 },
    /// Satisfied while the fan sits exactly on this tier.
    TierReached { value: Tier },
    ActivityCount { activity_type: FanCounter, value: u64 },
}

impl UnlockCriterion {
    pub fn is_met(&self, state: &FanState) -> bool {
        match self {
            UnlockCriterion::PointsTotal { value } => state.points >= *value,
            UnlockCriterion::ListeningTime { value } => state.total_listening_time_ms >= *value,
            UnlockCriterion::SongsLiked { value } => state.songs_liked >= *value,
            UnlockCriterion::StreakDays { value } => state.streak_days >= *value,
            UnlockCriterion::TierReached { value } => state.tier == *value,
            UnlockCriterion::ActivityCount {
                activity_type,
                value,
            } => state.counter(*activity_type) >= *value,
        }
    }

    /// The FanState value this criterion is checked against.
    pub fn observed(&self, state: &FanState) -> serde_json::Value {
        match self {
            UnlockCriterion::PointsTotal { .. } => json!(state.points),
            UnlockCriterion::ListeningTime { .. } => json!(state.total_listening_time_ms),
            UnlockCriterion::SongsLiked { .. } => json!(state.songs_liked),
            UnlockCriterion::StreakDays { .. } => json!(state.streak_days),
            UnlockCriterion::TierReached { .. } => json!(state.tier),
            UnlockCriterion::ActivityCount { activity_type, .. } => {
                json!(state.counter(*activity_type))
            }
        }
    }
}

/// Catalog entry. `artist_id = None` means the achievement is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    #[serde(default)]
    pub artist_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unlock_criteria: UnlockCriterion,
}

impl Achievement {
    pub fn applies_to(&self, artist_id: &str) -> bool {
        self.artist_id.as_deref().map_or(true, |a| a == artist_id)
    }
}

/// Junction row, written once per (user, achievement, artist).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub user_id: String,
    pub achievement_id: String,
    pub artist_id: String,
    pub unlocked_at: DateTime<Utc>,
    pub progress_data: serde_json::Value,
}

// ─── Milestones ─────────────────────────────────────────────────────────────

/// One-shot gate keyed purely on the point total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub title: String,
    pub required_points: u64,
    #[serde(default)]
    pub reward: serde_json::Value,
}

/// Completion record per (user, milestone, artist). Completion never reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMilestoneProgress {
    pub user_id: String,
    pub milestone_id: String,
    pub artist_id: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub reward_claimed: bool,
}

// ─── Catalog File ───────────────────────────────────────────────────────────

/// Achievements and milestones seeded into the store at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl Catalog {
    /// Load a catalog file; the format follows the file extension.
    pub fn load(path: &Path) -> FanResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;
        let catalog: Catalog = settings.try_deserialize()?;
        catalog.validate()?;
        tracing::debug!(
            path = %path.display(),
            achievements = catalog.achievements.len(),
            milestones = catalog.milestones.len(),
            "Catalog file parsed"
        );
        Ok(catalog)
    }

    pub fn validate(&self) -> FanResult<()> {
        let mut seen = HashSet::new();
        for a in &self.achievements {
            if a.id.is_empty() || a.title.is_empty() {
                return Err(FanError::Config(
                    "achievement entries need an id and a title".to_string(),
                ));
            }
            if !seen.insert(a.id.as_str()) {
                return Err(FanError::Config(format!("duplicate achievement id '{}'", a.id)));
            }
        }

        let mut seen = HashSet::new();
        for m in &self.milestones {
            if m.id.is_empty() || m.title.is_empty() {
                return Err(FanError::Config(
                    "milestone entries need an id and a title".to_string(),
                ));
            }
            if !seen.insert(m.id.as_str()) {
                return Err(FanError::Config(format!("duplicate milestone id '{}'", m.id)));
            }
        }
        Ok(())
    }
}
