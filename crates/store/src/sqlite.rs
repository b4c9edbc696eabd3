//! SQLite-backed store.
//!
//! Writers are serialized per database: the first statement of every
//! transaction is a no-op UPDATE on the pair's row, which takes SQLite's
//! RESERVED lock before anything is read. Concurrent events for the same
//! pair wait on `busy_timeout` and then read the committed state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fanscore_core::config::DatabaseConfig;
use fanscore_core::{
    Achievement, ActivityLogEntry, ActivityType, FanError, FanResult, FanState, FanStore,
    FanTransaction, Milestone, Tier, UnlockCriterion, UserAchievement, UserMilestoneProgress,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS fan_states (
        user_id TEXT NOT NULL,
        artist_id TEXT NOT NULL,
        tier TEXT NOT NULL DEFAULT 'Bronze',
        points INTEGER NOT NULL DEFAULT 0,
        total_listening_time_ms INTEGER NOT NULL DEFAULT 0,
        songs_liked INTEGER NOT NULL DEFAULT 0,
        songs_shared INTEGER NOT NULL DEFAULT 0,
        playlists_created INTEGER NOT NULL DEFAULT 0,
        nfts_purchased INTEGER NOT NULL DEFAULT 0,
        concerts_attended INTEGER NOT NULL DEFAULT 0,
        streak_days INTEGER NOT NULL DEFAULT 0,
        last_activity_at TEXT,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, artist_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS achievements (
        id TEXT PRIMARY KEY,
        artist_id TEXT,
        title TEXT NOT NULL,
        description TEXT,
        unlock_criteria TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_achievements (
        user_id TEXT NOT NULL,
        achievement_id TEXT NOT NULL,
        artist_id TEXT NOT NULL,
        unlocked_at TEXT NOT NULL,
        progress_data TEXT NOT NULL,
        PRIMARY KEY (user_id, achievement_id, artist_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS milestones (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        required_points INTEGER NOT NULL,
        reward TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_milestone_progress (
        user_id TEXT NOT NULL,
        milestone_id TEXT NOT NULL,
        artist_id TEXT NOT NULL,
        is_completed INTEGER NOT NULL DEFAULT 0,
        completed_at TEXT,
        reward_claimed INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, milestone_id, artist_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fan_activity_log (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL,
        artist_id TEXT NOT NULL,
        activity_type TEXT NOT NULL,
        points_earned INTEGER NOT NULL,
        tier_updated INTEGER NOT NULL,
        achievement_unlocked TEXT,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_activity_log_pair ON fan_activity_log (user_id, artist_id, created_at)",
];

const FAN_STATE_COLUMNS: &str = "user_id, artist_id, tier, points, total_listening_time_ms, \
     songs_liked, songs_shared, playlists_created, nfts_purchased, concerts_attended, \
     streak_days, last_activity_at";

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database and apply the schema.
    pub async fn connect(config: &DatabaseConfig) -> FanResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(db_err)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        info!(url = %config.url, max_connections = config.max_connections, "sqlite store connected");
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply the schema.
    pub async fn from_pool(pool: Pool<Sqlite>) -> FanResult<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(db_err)?;
        }
        debug!("sqlite schema ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl FanStore for SqliteStore {
    async fn begin(&self, user_id: &str, artist_id: &str) -> FanResult<Box<dyn FanTransaction>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(SqliteTransaction {
            tx,
            user_id: user_id.to_string(),
            artist_id: artist_id.to_string(),
        }))
    }

    async fn fan_state(&self, user_id: &str, artist_id: &str) -> FanResult<Option<FanState>> {
        let sql = format!("SELECT {FAN_STATE_COLUMNS} FROM fan_states WHERE user_id = ? AND artist_id = ?");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(artist_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(fan_state_from_row).transpose()
    }

    async fn activity_log(
        &self,
        user_id: &str,
        artist_id: &str,
        limit: u32,
    ) -> FanResult<Vec<ActivityLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, artist_id, activity_type, points_earned, tier_updated,
                   achievement_unlocked, data, created_at
            FROM fan_activity_log
            WHERE user_id = ? AND artist_id = ?
            ORDER BY created_at DESC, seq DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(artist_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(log_entry_from_row).collect()
    }

    async fn user_achievements(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> FanResult<Vec<UserAchievement>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, achievement_id, artist_id, unlocked_at, progress_data
            FROM user_achievements
            WHERE user_id = ? AND artist_id = ?
            ORDER BY unlocked_at, rowid
            "#,
        )
        .bind(user_id)
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok(UserAchievement {
                    user_id: row.try_get("user_id").map_err(db_err)?,
                    achievement_id: row.try_get("achievement_id").map_err(db_err)?,
                    artist_id: row.try_get("artist_id").map_err(db_err)?,
                    unlocked_at: row.try_get("unlocked_at").map_err(db_err)?,
                    progress_data: json_column(row, "progress_data")?,
                })
            })
            .collect()
    }

    async fn milestone_progress(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> FanResult<Vec<UserMilestoneProgress>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, milestone_id, artist_id, is_completed, completed_at, reward_claimed
            FROM user_milestone_progress
            WHERE user_id = ? AND artist_id = ?
            ORDER BY completed_at, rowid
            "#,
        )
        .bind(user_id)
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok(UserMilestoneProgress {
                    user_id: row.try_get("user_id").map_err(db_err)?,
                    milestone_id: row.try_get("milestone_id").map_err(db_err)?,
                    artist_id: row.try_get("artist_id").map_err(db_err)?,
                    is_completed: row.try_get("is_completed").map_err(db_err)?,
                    completed_at: row.try_get("completed_at").map_err(db_err)?,
                    reward_claimed: row.try_get("reward_claimed").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn put_achievement(&self, achievement: &Achievement) -> FanResult<()> {
        let criteria = serde_json::to_string(&achievement.unlock_criteria)?;
        sqlx::query(
            r#"
            INSERT INTO achievements (id, artist_id, title, description, unlock_criteria)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                artist_id = excluded.artist_id,
                title = excluded.title,
                description = excluded.description,
                unlock_criteria = excluded.unlock_criteria
            "#,
        )
        .bind(&achievement.id)
        .bind(&achievement.artist_id)
        .bind(&achievement.title)
        .bind(&achievement.description)
        .bind(criteria)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn put_milestone(&self, milestone: &Milestone) -> FanResult<()> {
        sqlx::query(
            r#"
            INSERT INTO milestones (id, title, required_points, reward)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                required_points = excluded.required_points,
                reward = excluded.reward
            "#,
        )
        .bind(&milestone.id)
        .bind(&milestone.title)
        .bind(to_i64(milestone.required_points)?)
        .bind(serde_json::to_string(&milestone.reward)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
    user_id: String,
    artist_id: String,
}

#[async_trait]
impl FanTransaction for SqliteTransaction {
    async fn lock_fan_state(&mut self) -> FanResult<Option<FanState>> {
        // Write first so the lock is held before the read.
        sqlx::query("UPDATE fan_states SET points = points WHERE user_id = ? AND artist_id = ?")
            .bind(&self.user_id)
            .bind(&self.artist_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;

        let sql = format!("SELECT {FAN_STATE_COLUMNS} FROM fan_states WHERE user_id = ? AND artist_id = ?");
        let row = sqlx::query(&sql)
            .bind(&self.user_id)
            .bind(&self.artist_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(fan_state_from_row).transpose()
    }

    async fn upsert_fan_state(&mut self, state: &FanState) -> FanResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fan_states (
                user_id, artist_id, tier, points, total_listening_time_ms, songs_liked,
                songs_shared, playlists_created, nfts_purchased, concerts_attended,
                streak_days, last_activity_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, artist_id) DO UPDATE SET
                tier = excluded.tier,
                points = excluded.points,
                total_listening_time_ms = excluded.total_listening_time_ms,
                songs_liked = excluded.songs_liked,
                songs_shared = excluded.songs_shared,
                playlists_created = excluded.playlists_created,
                nfts_purchased = excluded.nfts_purchased,
                concerts_attended = excluded.concerts_attended,
                streak_days = excluded.streak_days,
                last_activity_at = excluded.last_activity_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&state.user_id)
        .bind(&state.artist_id)
        .bind(state.tier.as_str())
        .bind(to_i64(state.points)?)
        .bind(to_i64(state.total_listening_time_ms)?)
        .bind(to_i64(state.songs_liked)?)
        .bind(to_i64(state.songs_shared)?)
        .bind(to_i64(state.playlists_created)?)
        .bind(to_i64(state.nfts_purchased)?)
        .bind(to_i64(state.concerts_attended)?)
        .bind(i64::from(state.streak_days))
        .bind(state.last_activity_at)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn achievement_catalog(&mut self) -> FanResult<Vec<Achievement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, artist_id, title, description, unlock_criteria
            FROM achievements
            WHERE artist_id IS NULL OR artist_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(&self.artist_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let criteria: String = row.try_get("unlock_criteria").map_err(db_err)?;
                let unlock_criteria: UnlockCriterion = serde_json::from_str(&criteria)?;
                Ok(Achievement {
                    id: row.try_get("id").map_err(db_err)?,
                    artist_id: row.try_get("artist_id").map_err(db_err)?,
                    title: row.try_get("title").map_err(db_err)?,
                    description: row.try_get("description").map_err(db_err)?,
                    unlock_criteria,
                })
            })
            .collect()
    }

    async fn unlocked_achievement_ids(&mut self) -> FanResult<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT achievement_id FROM user_achievements WHERE user_id = ? AND artist_id = ?",
        )
        .bind(&self.user_id)
        .bind(&self.artist_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(ids.into_iter().collect())
    }

    async fn insert_user_achievement(&mut self, unlock: &UserAchievement) -> FanResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id, artist_id, unlocked_at, progress_data)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, achievement_id, artist_id) DO NOTHING
            "#,
        )
        .bind(&unlock.user_id)
        .bind(&unlock.achievement_id)
        .bind(&unlock.artist_id)
        .bind(unlock.unlocked_at)
        .bind(serde_json::to_string(&unlock.progress_data)?)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn milestones_within(&mut self, points: u64) -> FanResult<Vec<Milestone>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, required_points, reward
            FROM milestones
            WHERE required_points <= ?
            ORDER BY required_points, rowid
            "#,
        )
        .bind(to_i64(points)?)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok(Milestone {
                    id: row.try_get("id").map_err(db_err)?,
                    title: row.try_get("title").map_err(db_err)?,
                    required_points: u64_column(row, "required_points")?,
                    reward: json_column(row, "reward")?,
                })
            })
            .collect()
    }

    async fn completed_milestone_ids(&mut self) -> FanResult<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT milestone_id FROM user_milestone_progress
            WHERE user_id = ? AND artist_id = ? AND is_completed = 1
            "#,
        )
        .bind(&self.user_id)
        .bind(&self.artist_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(ids.into_iter().collect())
    }

    async fn complete_milestone(&mut self, progress: &UserMilestoneProgress) -> FanResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_milestone_progress
                (user_id, milestone_id, artist_id, is_completed, completed_at, reward_claimed)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(user_id, milestone_id, artist_id) DO UPDATE SET
                is_completed = 1,
                completed_at = excluded.completed_at
            WHERE user_milestone_progress.is_completed = 0
            "#,
        )
        .bind(&progress.user_id)
        .bind(&progress.milestone_id)
        .bind(&progress.artist_id)
        .bind(progress.completed_at)
        .bind(progress.reward_claimed)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn append_activity_log(&mut self, entry: &ActivityLogEntry) -> FanResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fan_activity_log (
                id, user_id, artist_id, activity_type, points_earned, tier_updated,
                achievement_unlocked, data, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.user_id)
        .bind(&entry.artist_id)
        .bind(entry.activity_type.as_str())
        .bind(to_i64(entry.points_earned)?)
        .bind(entry.tier_updated)
        .bind(&entry.achievement_unlocked)
        .bind(serde_json::to_string(&entry.data)?)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> FanResult<()> {
        self.tx.commit().await.map_err(db_err)
    }
}

// ─── Row Mapping ────────────────────────────────────────────────────────────

fn fan_state_from_row(row: &SqliteRow) -> FanResult<FanState> {
    let tier: String = row.try_get("tier").map_err(db_err)?;
    let streak_days: i64 = row.try_get("streak_days").map_err(db_err)?;
    Ok(FanState {
        user_id: row.try_get("user_id").map_err(db_err)?,
        artist_id: row.try_get("artist_id").map_err(db_err)?,
        tier: Tier::from_str(&tier).map_err(FanError::Store)?,
        points: u64_column(row, "points")?,
        total_listening_time_ms: u64_column(row, "total_listening_time_ms")?,
        songs_liked: u64_column(row, "songs_liked")?,
        songs_shared: u64_column(row, "songs_shared")?,
        playlists_created: u64_column(row, "playlists_created")?,
        nfts_purchased: u64_column(row, "nfts_purchased")?,
        concerts_attended: u64_column(row, "concerts_attended")?,
        streak_days: u32::try_from(streak_days)
            .map_err(|_| FanError::Store(format!("streak_days out of range: {streak_days}")))?,
        last_activity_at: row.try_get::<Option<DateTime<Utc>>, _>("last_activity_at").map_err(db_err)?,
    })
}

fn log_entry_from_row(row: &SqliteRow) -> FanResult<ActivityLogEntry> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let activity_type: String = row.try_get("activity_type").map_err(db_err)?;
    Ok(ActivityLogEntry {
        id: Uuid::parse_str(&id).map_err(|e| FanError::Store(format!("bad log id '{id}': {e}")))?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        artist_id: row.try_get("artist_id").map_err(db_err)?,
        activity_type: ActivityType::from_str(&activity_type)
            .map_err(|e| FanError::Store(e.to_string()))?,
        points_earned: u64_column(row, "points_earned")?,
        tier_updated: row.try_get("tier_updated").map_err(db_err)?,
        achievement_unlocked: row.try_get("achievement_unlocked").map_err(db_err)?,
        data: json_column(row, "data")?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn u64_column(row: &SqliteRow, column: &str) -> FanResult<u64> {
    let value: i64 = row.try_get(column).map_err(db_err)?;
    u64::try_from(value).map_err(|_| FanError::Store(format!("{column} is negative: {value}")))
}

fn json_column(row: &SqliteRow, column: &str) -> FanResult<serde_json::Value> {
    let raw: String = row.try_get(column).map_err(db_err)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Out-of-range counters are rejected as invalid input; resubmitting cannot succeed.
fn to_i64(value: u64) -> FanResult<i64> {
    i64::try_from(value)
        .map_err(|_| FanError::Validation(format!("value {value} exceeds storage range")))
}

/// Lock contention and key races are retryable conflicts; everything else is a store failure.
fn db_err(err: sqlx::Error) -> FanError {
    let kind = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => "conflict",
        sqlx::Error::Database(db) if is_busy(db.code().as_deref()) => "conflict",
        _ => "store",
    };
    metrics::counter!("fan.store.db_errors", "kind" => kind).increment(1);
    match kind {
        "conflict" => FanError::Conflict(err.to_string()),
        _ => FanError::Store(err.to_string()),
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED and their extended codes.
fn is_busy(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map_or(false, |c| matches!(c & 0xff, 5 | 6))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use serde_json::json;
    use std::sync::Arc;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn log_entry(points: u64, created_at: DateTime<Utc>) -> ActivityLogEntry {
        ActivityLogEntry {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            artist_id: "a1".into(),
            activity_type: ActivityType::SongShare,
            points_earned: points,
            tier_updated: false,
            achievement_unlocked: Some("First Share".into()),
            data: json!({"source": "test"}),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_fan_state_round_trip() {
        let store = memory_store().await;
        let mut state = FanState::new("u1", "a1");
        state.points = 5_200;
        state.tier = Tier::Gold;
        state.total_listening_time_ms = 90_000;
        state.concerts_attended = 2;
        state.streak_days = 4;
        state.last_activity_at = Some(t0());

        let mut tx = store.begin("u1", "a1").await.unwrap();
        assert!(tx.lock_fan_state().await.unwrap().is_none());
        tx.upsert_fan_state(&state).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.fan_state("u1", "a1").await.unwrap(), Some(state));
        assert!(store.fan_state("u1", "a2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = memory_store().await;
        {
            let mut tx = store.begin("u1", "a1").await.unwrap();
            tx.lock_fan_state().await.unwrap();
            tx.upsert_fan_state(&FanState::new("u1", "a1")).await.unwrap();
            tx.append_activity_log(&log_entry(10, t0())).await.unwrap();
        }
        assert!(store.fan_state("u1", "a1").await.unwrap().is_none());
        assert!(store.activity_log("u1", "a1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counter_beyond_column_range_is_not_retryable() {
        let store = memory_store().await;
        let mut state = FanState::new("u1", "a1");
        state.total_listening_time_ms = u64::MAX;

        let mut tx = store.begin("u1", "a1").await.unwrap();
        tx.lock_fan_state().await.unwrap();
        let err = tx.upsert_fan_state(&state).await.unwrap_err();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
        drop(tx);

        assert!(store.fan_state("u1", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_catalog_scoping_and_upsert() {
        let store = memory_store().await;
        let global = Achievement {
            id: "loyal".into(),
            artist_id: None,
            title: "Loyal".into(),
            description: Some("Listen for an hour".into()),
            unlock_criteria: UnlockCriterion::ListeningTime { value: 3_600_000 },
        };
        let scoped = Achievement {
            id: "gold-a2".into(),
            artist_id: Some("a2".into()),
            title: "Gold Fan".into(),
            description: None,
            unlock_criteria: UnlockCriterion::TierReached { value: Tier::Gold },
        };
        store.put_achievement(&global).await.unwrap();
        store.put_achievement(&scoped).await.unwrap();
        store
            .put_achievement(&Achievement {
                title: "Loyal Listener".into(),
                ..global.clone()
            })
            .await
            .unwrap();

        let mut tx = store.begin("u1", "a1").await.unwrap();
        let catalog = tx.achievement_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].title, "Loyal Listener");
        assert_eq!(catalog[0].unlock_criteria, global.unlock_criteria);
        drop(tx);

        let mut tx = store.begin("u1", "a2").await.unwrap();
        assert_eq!(tx.achievement_catalog().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_user_achievement_written_once() {
        let store = memory_store().await;
        let unlock = UserAchievement {
            user_id: "u1".into(),
            achievement_id: "loyal".into(),
            artist_id: "a1".into(),
            unlocked_at: t0(),
            progress_data: json!({"unlocked_by": "listening_time", "unlocked_value": 3_600_000}),
        };
        let mut tx = store.begin("u1", "a1").await.unwrap();
        assert!(tx.insert_user_achievement(&unlock).await.unwrap());
        assert!(!tx.insert_user_achievement(&unlock).await.unwrap());
        tx.commit().await.unwrap();

        let unlocked = store.user_achievements("u1", "a1").await.unwrap();
        assert_eq!(unlocked, vec![unlock]);
    }

    #[tokio::test]
    async fn test_milestones_lowest_first_and_complete_once() {
        let store = memory_store().await;
        for (id, points) in [("m5k", 5_000), ("m1k", 1_000), ("m20k", 20_000)] {
            store
                .put_milestone(&Milestone {
                    id: id.into(),
                    title: id.into(),
                    required_points: points,
                    reward: json!({"badge": id}),
                })
                .await
                .unwrap();
        }

        let mut tx = store.begin("u1", "a1").await.unwrap();
        let within = tx.milestones_within(6_000).await.unwrap();
        let ids: Vec<&str> = within.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1k", "m5k"]);
        assert_eq!(within[0].reward["badge"], "m1k");

        let progress = UserMilestoneProgress {
            user_id: "u1".into(),
            milestone_id: "m1k".into(),
            artist_id: "a1".into(),
            is_completed: true,
            completed_at: Some(t0()),
            reward_claimed: false,
        };
        assert!(tx.complete_milestone(&progress).await.unwrap());
        assert!(!tx.complete_milestone(&progress).await.unwrap());
        assert!(tx.completed_milestone_ids().await.unwrap().contains("m1k"));
        tx.commit().await.unwrap();

        let stored = store.milestone_progress("u1", "a1").await.unwrap();
        assert_eq!(stored, vec![progress]);
    }

    #[tokio::test]
    async fn test_activity_log_newest_first() {
        let store = memory_store().await;
        let mut tx = store.begin("u1", "a1").await.unwrap();
        tx.append_activity_log(&log_entry(1, t0())).await.unwrap();
        tx.append_activity_log(&log_entry(2, t0() + ChronoDuration::minutes(5))).await.unwrap();
        tx.append_activity_log(&log_entry(3, t0() + ChronoDuration::minutes(5))).await.unwrap();
        tx.commit().await.unwrap();

        let feed = store.activity_log("u1", "a1", 2).await.unwrap();
        let points: Vec<u64> = feed.iter().map(|e| e.points_earned).collect();
        assert_eq!(points, vec![3, 2]);
        assert_eq!(feed[0].data["source"], "test");
        assert_eq!(feed[0].achievement_unlocked.as_deref(), Some("First Share"));
    }

    #[tokio::test]
    async fn test_concurrent_pair_writers_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("fans.db").display());
        let config = DatabaseConfig {
            url,
            max_connections: 4,
            busy_timeout_ms: 10_000,
        };
        let store = Arc::new(SqliteStore::connect(&config).await.unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut tx = store.begin("u1", "a1").await.unwrap();
                let mut state = tx
                    .lock_fan_state()
                    .await
                    .unwrap()
                    .unwrap_or_else(|| FanState::new("u1", "a1"));
                state.points += 10;
                state.songs_liked += 1;
                tx.upsert_fan_state(&state).await.unwrap();
                tx.commit().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let state = store.fan_state("u1", "a1").await.unwrap().unwrap();
        assert_eq!(state.points, 80);
        assert_eq!(state.songs_liked, 8);
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_busy(Some("5")));
        assert!(is_busy(Some("517")));
        assert!(is_busy(Some("6")));
        assert!(!is_busy(Some("19")));
        assert!(!is_busy(None));
    }
}
