//! Fan engagement engine: turns validated activity events into score, tier,
//! streak, achievement, and milestone state for each (user, artist) pair.

use crate::merge::merge_activity;
use crate::points::PointRules;
use crate::tiers::TierTable;
use crate::{achievements, milestones, notifications};
use chrono::{DateTime, Utc};
use fanscore_core::config::ScoringConfig;
use fanscore_core::{
    Activity, ActivityLogEntry, ActivityRequest, Catalog, FanResult, FanState, FanStore,
    NextTierProgress, NotificationDispatcher, NotificationIntent, TierUpdateResult,
    UserAchievement, UserMilestoneProgress,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Result of one processed event: the caller-facing result plus the
/// notification intents handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct ProcessedActivity {
    pub result: TierUpdateResult,
    pub notifications: Vec<NotificationIntent>,
}

pub struct EngagementEngine {
    points: PointRules,
    tiers: TierTable,
    channels: Vec<String>,
    store: Arc<dyn FanStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    deliveries: Mutex<JoinSet<()>>,
}

impl EngagementEngine {
    pub fn new(
        config: &ScoringConfig,
        store: Arc<dyn FanStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> FanResult<Self> {
        config.validate()?;
        let tiers = TierTable::from_scoring(config)?;
        info!(
            silver = config.tiers.silver,
            gold = config.tiers.gold,
            diamond = config.tiers.diamond,
            platinum = config.tiers.platinum,
            "Engagement engine initialized"
        );
        Ok(Self {
            points: PointRules::new(&config.points),
            tiers,
            channels: vec!["push".to_string(), "in_app".to_string()],
            store,
            dispatcher,
            deliveries: Mutex::new(JoinSet::new()),
        })
    }

    /// Delivery channels stamped on every notification intent.
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    pub async fn process_activity(&self, request: &ActivityRequest) -> FanResult<ProcessedActivity> {
        self.process_activity_at(request, Utc::now()).await
    }

    /// Process one event as of `now`. Validation happens before the store is
    /// touched; every write then commits together or not at all. Failed
    /// transactions are returned to the caller, never retried here.
    pub async fn process_activity_at(
        &self,
        request: &ActivityRequest,
        now: DateTime<Utc>,
    ) -> FanResult<ProcessedActivity> {
        let activity = request.validate().map_err(|e| {
            metrics::counter!("fan.activities_rejected").increment(1);
            warn!(
                user_id = %request.user_id,
                artist_id = %request.artist_id,
                activity_type = %request.activity.kind,
                error = %e,
                "Activity rejected"
            );
            e
        })?;

        let points_earned = self.points.points_for(&activity);

        let processed = self
            .record(&request.user_id, &request.artist_id, &activity, points_earned, now)
            .await
            .map_err(|e| {
                metrics::counter!("fan.store_errors").increment(1);
                error!(
                    user_id = %request.user_id,
                    artist_id = %request.artist_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Activity transaction failed"
                );
                e
            })?;

        self.notify(processed.notifications.clone());
        Ok(processed)
    }

    async fn record(
        &self,
        user_id: &str,
        artist_id: &str,
        activity: &Activity,
        points_earned: u64,
        now: DateTime<Utc>,
    ) -> FanResult<ProcessedActivity> {
        let mut tx = self.store.begin(user_id, artist_id).await?;

        let previous = tx
            .lock_fan_state()
            .await?
            .unwrap_or_else(|| FanState::new(user_id, artist_id));
        let merged = merge_activity(&previous, activity, points_earned, &self.tiers, now);
        tx.upsert_fan_state(&merged.state).await?;

        let unlocked = achievements::evaluate(tx.as_mut(), &merged.state, activity, now).await?;
        let reached = milestones::evaluate(tx.as_mut(), &merged.state, now).await?;

        let entry = notifications::log_entry(&merged, activity, &unlocked, &reached, now);
        tx.append_activity_log(&entry).await?;
        tx.commit().await?;

        metrics::counter!("fan.activities_processed", "type" => activity.kind.as_str()).increment(1);
        metrics::counter!("fan.points_earned").increment(points_earned);
        metrics::counter!("fan.achievements_unlocked").increment(unlocked.len() as u64);
        metrics::counter!("fan.milestones_reached").increment(reached.len() as u64);

        let state = &merged.state;
        if merged.tier_changed {
            metrics::counter!("fan.tier_upgrades").increment(1);
            info!(
                user_id = %user_id,
                artist_id = %artist_id,
                old = %merged.previous_tier,
                new = %state.tier,
                points = state.points,
                "Tier upgrade"
            );
        }

        debug!(
            user_id = %user_id,
            artist_id = %artist_id,
            activity_type = %activity.kind,
            points_earned = points_earned,
            total = state.points,
            streak = state.streak_days,
            streak_change = ?merged.streak,
            achievements = unlocked.len(),
            milestones = reached.len(),
            "Activity processed"
        );

        let intents = notifications::decide(&merged, &unlocked, &self.channels);
        Ok(ProcessedActivity {
            result: TierUpdateResult {
                previous_tier: merged.previous_tier,
                new_tier: state.tier,
                points_earned,
                total_points: state.points,
                tier_changed: merged.tier_changed,
                achievements_unlocked: unlocked,
                milestones_reached: reached,
                next_tier_progress: self.tiers.progress(state.points),
            },
            notifications: intents,
        })
    }

    /// Deliver intents on a background task so the caller never waits on the
    /// dispatcher. Failures are logged and counted only; the state change and
    /// audit row are already committed.
    fn notify(&self, intents: Vec<NotificationIntent>) {
        if intents.is_empty() {
            return;
        }
        let dispatcher = self.dispatcher.clone();
        let mut deliveries = self.deliveries.lock();
        while deliveries.try_join_next().is_some() {}
        deliveries.spawn(async move {
            for intent in &intents {
                if let Err(e) = dispatcher.dispatch(intent).await {
                    metrics::counter!("fan.notifications_failed").increment(1);
                    warn!(
                        user_id = %intent.user_id,
                        kind = ?intent.kind,
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        });
    }

    /// Wait for every notification delivery spawned so far.
    pub async fn flush_notifications(&self) {
        let mut pending = std::mem::take(&mut *self.deliveries.lock());
        let count = pending.len();
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Notification delivery task failed");
            }
        }
        if count > 0 {
            debug!(tasks = count, "Notification deliveries flushed");
        }
    }

    /// Current state, or the zero-value default for a pair with no activity.
    pub async fn fan_state(&self, user_id: &str, artist_id: &str) -> FanResult<FanState> {
        Ok(self
            .store
            .fan_state(user_id, artist_id)
            .await?
            .unwrap_or_else(|| FanState::new(user_id, artist_id)))
    }

    pub fn progress(&self, state: &FanState) -> NextTierProgress {
        self.tiers.progress(state.points)
    }

    pub async fn activity_feed(
        &self,
        user_id: &str,
        artist_id: &str,
        limit: u32,
    ) -> FanResult<Vec<ActivityLogEntry>> {
        self.store.activity_log(user_id, artist_id, limit).await
    }

    pub async fn achievements(&self, user_id: &str, artist_id: &str) -> FanResult<Vec<UserAchievement>> {
        self.store.user_achievements(user_id, artist_id).await
    }

    pub async fn milestones(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> FanResult<Vec<UserMilestoneProgress>> {
        self.store.milestone_progress(user_id, artist_id).await
    }

    /// Upsert catalog entries into the store.
    pub async fn seed_catalog(&self, catalog: &Catalog) -> FanResult<()> {
        catalog.validate()?;
        for achievement in &catalog.achievements {
            self.store.put_achievement(achievement).await?;
        }
        for milestone in &catalog.milestones {
            self.store.put_milestone(milestone).await?;
        }
        info!(
            achievements = catalog.achievements.len(),
            milestones = catalog.milestones.len(),
            "Catalog seeded"
        );
        Ok(())
    }
}
