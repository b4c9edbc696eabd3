#![warn(clippy::unwrap_used)]

pub mod achievements;
pub mod dispatch;
pub mod engine;
pub mod merge;
pub mod milestones;
pub mod notifications;
pub mod points;
pub mod streak;
pub mod tiers;

pub use dispatch::{HttpDispatcher, LogDispatcher};
pub use engine::{EngagementEngine, ProcessedActivity};
pub use points::PointRules;
pub use tiers::TierTable;
