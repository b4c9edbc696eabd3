//! Fan pair aggregate: the per (user, artist) reputation record and its tier ladder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Tier Ladder ────────────────────────────────────────────────────────────

/// Ordered reputation rank derived from cumulative points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Diamond,
    Platinum,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Tier; 5] = [
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Diamond,
        Tier::Platinum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Diamond => "Diamond",
            Tier::Platinum => "Platinum",
        }
    }

    /// Position on the ladder, Bronze = 0.
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// The tier directly above this one, if any.
    pub fn next(&self) -> Option<Tier> {
        Tier::ALL.get(self.rank() + 1).copied()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown tier '{s}'"))
    }
}

// ─── Fan State ──────────────────────────────────────────────────────────────

/// Durable aggregate for one fan pair. `tier` is always the classification of `points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanState {
    pub user_id: String,
    pub artist_id: String,
    pub tier: Tier,
    pub points: u64,
    pub total_listening_time_ms: u64,
    pub songs_liked: u64,
    pub songs_shared: u64,
    pub playlists_created: u64,
    pub nfts_purchased: u64,
    pub concerts_attended: u64,
    pub streak_days: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl FanState {
    /// Zero-value state for a pair with no recorded activity.
    pub fn new(user_id: impl Into<String>, artist_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            artist_id: artist_id.into(),
            tier: Tier::Bronze,
            points: 0,
            total_listening_time_ms: 0,
            songs_liked: 0,
            songs_shared: 0,
            playlists_created: 0,
            nfts_purchased: 0,
            concerts_attended: 0,
            streak_days: 0,
            last_activity_at: None,
        }
    }

    /// Read a named counter, used by `activity_count` criteria and unlock provenance.
    pub fn counter(&self, counter: FanCounter) -> u64 {
        match counter {
            FanCounter::PointsTotal => self.points,
            FanCounter::ListeningTime => self.total_listening_time_ms,
            FanCounter::SongsLiked => self.songs_liked,
            FanCounter::SongsShared => self.songs_shared,
            FanCounter::PlaylistsCreated => self.playlists_created,
            FanCounter::NftsPurchased => self.nfts_purchased,
            FanCounter::ConcertsAttended => self.concerts_attended,
            FanCounter::StreakDays => u64::from(self.streak_days),
        }
    }
}

/// Named FanState fields an unlock criterion can compare against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FanCounter {
    PointsTotal,
    ListeningTime,
    SongsLiked,
    SongsShared,
    PlaylistsCreated,
    NftsPurchased,
    ConcertsAttended,
    StreakDays,
}

/// Progress from the current tier floor toward the next tier floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextTierProgress {
    pub current: u64,
    pub required: u64,
    /// Whole percent in [0, 100]; 100 at the top tier.
    pub percentage: u8,
}
