//! Activity events, their validated form, the per-event result, and the audit log row.

use crate::error::{FanError, FanResult};
use crate::fan::{NextTierProgress, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum identifier length accepted at the boundary.
pub const MAX_ID_LEN: usize = 256;

/// Largest activity magnitude accepted. Counters derived from it must fit the
/// store's signed 64-bit columns and stay exact as f64.
pub const MAX_ACTIVITY_VALUE: f64 = 1e15;

/// Kinds of fan activity the engine scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// `value` is the listened duration in milliseconds.
    SongPlay,
    SongLike,
    SongShare,
    PlaylistCreate,
    /// `value` is the purchase price in platform units.
    NftPurchase,
    ConcertAttend,
}

impl ActivityType {
    pub const ALL: [ActivityType; 6] = [
        ActivityType::SongPlay,
        ActivityType::SongLike,
        ActivityType::SongShare,
        ActivityType::PlaylistCreate,
        ActivityType::NftPurchase,
        ActivityType::ConcertAttend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::SongPlay => "song_play",
            ActivityType::SongLike => "song_like",
            ActivityType::SongShare => "song_share",
            ActivityType::PlaylistCreate => "playlist_create",
            ActivityType::NftPurchase => "nft_purchase",
            ActivityType::ConcertAttend => "concert_attend",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = FanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| FanError::UnknownActivity(s.to_string()))
    }
}

// ─── Request / Response ─────────────────────────────────────────────────────

/// Inbound activity event as submitted by the capture path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub artist_id: String,
    pub activity: ActivityPayload,
}

/// Untyped activity body. `kind` stays a string so unknown types are rejected
/// by validation with a descriptive error instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// An activity that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: ActivityType,
    pub value: f64,
    pub metadata: Option<serde_json::Value>,
}

impl Activity {
    pub fn new(kind: ActivityType, value: f64) -> Self {
        Self {
            kind,
            value,
            metadata: None,
        }
    }
}

impl ActivityRequest {
    pub fn new(
        user_id: impl Into<String>,
        artist_id: impl Into<String>,
        kind: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            artist_id: artist_id.into(),
            activity: ActivityPayload {
                kind: kind.into(),
                value,
                metadata: None,
            },
        }
    }

    /// Check identifiers and the activity body, producing the typed activity.
    pub fn validate(&self) -> FanResult<Activity> {
        validate_id("userId", &self.user_id)?;
        validate_id("artistId", &self.artist_id)?;

        let kind: ActivityType = self.activity.kind.parse()?;
        let value = self.activity.value;
        if !value.is_finite() {
            return Err(FanError::Validation(
                "activity 'value' must be a finite number".to_string(),
            ));
        }
        if value < 0.0 {
            return Err(FanError::Validation(
                "activity 'value' must be non-negative".to_string(),
            ));
        }
        if value > MAX_ACTIVITY_VALUE {
            return Err(FanError::Validation(format!(
                "activity 'value' exceeds maximum of {MAX_ACTIVITY_VALUE}"
            )));
        }
        if let Some(meta) = &self.activity.metadata {
            if !meta.is_object() && !meta.is_null() {
                return Err(FanError::Validation(
                    "activity 'metadata' must be an object".to_string(),
                ));
            }
        }

        Ok(Activity {
            kind,
            value,
            metadata: self.activity.metadata.clone(),
        })
    }
}

/// Reject empty or oversized identifiers. `field` names the offending input.
pub fn validate_id(field: &str, value: &str) -> FanResult<()> {
    if value.trim().is_empty() {
        return Err(FanError::Validation(format!("'{field}' must not be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(FanError::Validation(format!(
            "'{field}' exceeds maximum length of {MAX_ID_LEN}"
        )));
    }
    Ok(())
}

/// Outcome of one processed activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierUpdateResult {
    pub previous_tier: Tier,
    pub new_tier: Tier,
    pub points_earned: u64,
    pub total_points: u64,
    pub tier_changed: bool,
    pub achievements_unlocked: Vec<String>,
    pub milestones_reached: Vec<String>,
    pub next_tier_progress: NextTierProgress,
}

/// Response envelope for the activity endpoint. Failures carry the same
/// `error` / `code` / `message` fields as every other API error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub success: bool,
    pub result: Option<TierUpdateResult>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ActivityResponse {
    pub fn ok(result: TierUpdateResult) -> Self {
        let message = if result.tier_changed {
            format!("Congratulations! You've reached {} tier!", result.new_tier)
        } else {
            format!("You earned {} points!", result.points_earned)
        };
        Self {
            success: true,
            result: Some(result),
            message,
            error: None,
            code: None,
        }
    }

    pub fn rejected(err: &FanError) -> Self {
        Self {
            success: false,
            result: None,
            message: err.summary().to_string(),
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }
}

// ─── Audit Log ──────────────────────────────────────────────────────────────

/// Append-only audit row, one per processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub artist_id: String,
    pub activity_type: ActivityType,
    pub points_earned: u64,
    pub tier_updated: bool,
    /// First achievement unlocked by this event.
    pub achievement_unlocked: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
