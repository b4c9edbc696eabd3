#![warn(clippy::unwrap_used)]

pub mod activity;
pub mod config;
pub mod error;
pub mod fan;
pub mod notify;
pub mod rewards;
pub mod store;

pub use activity::{Activity, ActivityLogEntry, ActivityRequest, ActivityResponse, ActivityType, TierUpdateResult};
pub use config::AppConfig;
pub use error::{FanError, FanResult};
pub use fan::{FanCounter, FanState, NextTierProgress, Tier};
pub use notify::{NotificationDispatcher, NotificationIntent, NotificationKind};
pub use rewards::{Achievement, Catalog, Milestone, UnlockCriterion, UserAchievement, UserMilestoneProgress};
pub use store::{FanStore, FanTransaction};
