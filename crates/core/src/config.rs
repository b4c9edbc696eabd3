use crate::error::{FanError, FanResult};
use serde::Deserialize;

/// Root application configuration. Loaded from an optional `fanscore.toml`
/// and environment variables with the prefix `FANSCORE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    /// Dispatcher endpoint; notifications are only logged when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

// Default functions
fn default_node_id() -> String {
    "fanscore-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_database_url() -> String {
    "sqlite://fanscore.db?mode=rwc".to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_notifications_enabled() -> bool {
    true
}
fn default_notification_timeout_ms() -> u64 {
    2000
}
fn default_channels() -> Vec<String> {
    vec!["push".to_string(), "in_app".to_string()]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            endpoint: None,
            auth_token: None,
            timeout_ms: default_notification_timeout_ms(),
            channels: default_channels(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            database: DatabaseConfig::default(),
            notifications: NotificationConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

// ─── Scoring Rules ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub points: PointRulesConfig,
    #[serde(default)]
    pub tiers: TierThresholdsConfig,
}

/// Per-activity point formulas and caps.
#[derive(Debug, Clone, Deserialize)]
pub struct PointRulesConfig {
    #[serde(default = "default_song_play_block_ms")]
    pub song_play_block_ms: u64,
    #[serde(default = "default_song_play_points_per_block")]
    pub song_play_points_per_block: u64,
    #[serde(default = "default_song_play_max")]
    pub song_play_max: u64,
    #[serde(default = "default_song_like")]
    pub song_like: u64,
    #[serde(default = "default_song_share")]
    pub song_share: u64,
    #[serde(default = "default_playlist_create")]
    pub playlist_create: u64,
    #[serde(default = "default_nft_purchase_per_unit")]
    pub nft_purchase_per_unit: u64,
    #[serde(default = "default_nft_purchase_max")]
    pub nft_purchase_max: u64,
    #[serde(default = "default_concert_attend")]
    pub concert_attend: u64,
}

fn default_song_play_block_ms() -> u64 { 30_000 }
fn default_song_play_points_per_block() -> u64 { 5 }
fn default_song_play_max() -> u64 { 25 }
fn default_song_like() -> u64 { 10 }
fn default_song_share() -> u64 { 15 }
fn default_playlist_create() -> u64 { 50 }
fn default_nft_purchase_per_unit() -> u64 { 100 }
fn default_nft_purchase_max() -> u64 { 1000 }
fn default_concert_attend() -> u64 { 500 }

impl Default for PointRulesConfig {
    fn default() -> Self {
        Self {
            song_play_block_ms: default_song_play_block_ms(),
            song_play_points_per_block: default_song_play_points_per_block(),
            song_play_max: default_song_play_max(),
            song_like: default_song_like(),
            song_share: default_song_share(),
            playlist_create: default_playlist_create(),
            nft_purchase_per_unit: default_nft_purchase_per_unit(),
            nft_purchase_max: default_nft_purchase_max(),
            concert_attend: default_concert_attend(),
        }
    }
}

/// Lower bounds of each tier above Bronze. Bronze always starts at 0.
#[derive(Debug, Clone, Deserialize)]
pub struct TierThresholdsConfig {
    #[serde(default = "default_silver")]
    pub silver: u64,
    #[serde(default = "default_gold")]
    pub gold: u64,
    #[serde(default = "default_diamond")]
    pub diamond: u64,
    #[serde(default = "default_platinum")]
    pub platinum: u64,
}

fn default_silver() -> u64 { 1_000 }
fn default_gold() -> u64 { 5_000 }
fn default_diamond() -> u64 { 15_000 }
fn default_platinum() -> u64 { 40_000 }

impl Default for TierThresholdsConfig {
    fn default() -> Self {
        Self {
            silver: default_silver(),
            gold: default_gold(),
            diamond: default_diamond(),
            platinum: default_platinum(),
        }
    }
}

impl TierThresholdsConfig {
    /// Floors of Bronze through Platinum. They must be strictly ascending above
    /// zero so the ranges partition [0, inf) with no gaps or overlaps.
    pub fn floors(&self) -> FanResult<[u64; 5]> {
        let floors = [0, self.silver, self.gold, self.diamond, self.platinum];
        if floors.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FanError::Config(format!(
                "tier thresholds must be strictly ascending above 0, got {floors:?}"
            )));
        }
        Ok(floors)
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> FanResult<()> {
        self.tiers.floors()?;
        if self.points.song_play_block_ms == 0 {
            return Err(FanError::Config(
                "song_play_block_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("fanscore").required(false))
            .add_source(
                config::Environment::with_prefix("FANSCORE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("notifications.channels"),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scoring_is_valid() {
        let scoring = ScoringConfig::default();
        assert!(scoring.validate().is_ok());
        assert_eq!(scoring.points.song_play_max, 25);
        assert_eq!(scoring.tiers.platinum, 40_000);
    }

    #[test]
    fn test_non_ascending_tiers_rejected() {
        let mut scoring = ScoringConfig::default();
        scoring.tiers.gold = scoring.tiers.silver;
        assert!(matches!(scoring.validate(), Err(FanError::Config(_))));

        let mut scoring = ScoringConfig::default();
        scoring.tiers.silver = 0;
        assert!(scoring.validate().is_err());
    }

    #[test]
    fn test_default_floors() {
        let floors = TierThresholdsConfig::default().floors().unwrap();
        assert_eq!(floors, [0, 1_000, 5_000, 15_000, 40_000]);
    }

    #[test]
    fn test_zero_play_block_rejected() {
        let mut scoring = ScoringConfig::default();
        scoring.points.song_play_block_ms = 0;
        assert!(scoring.validate().is_err());
    }

    #[test]
    fn test_config_from_toml_source() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
node_id = "edge-3"

[database]
url = "sqlite::memory:"

[scoring.tiers]
silver = 500
"#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let cfg: AppConfig = settings.try_deserialize().unwrap();
        assert_eq!(cfg.node_id, "edge-3");
        assert_eq!(cfg.database.url, "sqlite::memory:");
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.scoring.tiers.silver, 500);
        assert_eq!(cfg.scoring.tiers.gold, 5_000);
        assert_eq!(cfg.notifications.channels, vec!["push", "in_app"]);
    }
}
