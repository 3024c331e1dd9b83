use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{error::EngineError, model::Location};

pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// How the local station publishes its readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[default]
    File,
    Http,
}

/// Local weather station settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSourceConfig {
    pub kind: SensorKind,
    /// `current.json` written by the station daemon.
    pub path: PathBuf,
    /// Endpoint for `kind = "http"`.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LocalSourceConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::File,
            path: PathBuf::from("/srv/doro_lab_projects/data/weather/current.json"),
            url: None,
            timeout_secs: 5,
        }
    }
}

/// OpenWeather settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineSourceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OnlineSourceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Tunables for staleness and window scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub staleness_minutes: u32,
    pub horizon_hours: u32,
    pub visibility_min_km: f64,
    pub visibility_ceiling_km: f64,
    pub wind_threshold_ms: f64,
    pub wind_penalty_per_ms: f64,
    pub wind_penalty_max: f64,
    /// Slots starting within this many hours get the current wind penalty.
    pub wind_relevance_hours: u32,
    /// Adjacent slots whose scores differ by at most this much merge into one window.
    pub merge_tolerance: f64,
    pub medium_confidence_hours: u32,
    pub cloud_weight: f64,
    pub visibility_weight: f64,
    pub darkness_weight: f64,
    pub moon_penalty_max: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            staleness_minutes: 10,
            horizon_hours: 48,
            visibility_min_km: 2.0,
            visibility_ceiling_km: 20.0,
            wind_threshold_ms: 8.0,
            wind_penalty_per_ms: 5.0,
            wind_penalty_max: 25.0,
            wind_relevance_hours: 3,
            merge_tolerance: 5.0,
            medium_confidence_hours: 12,
            cloud_weight: 60.0,
            visibility_weight: 20.0,
            darkness_weight: 20.0,
            moon_penalty_max: 15.0,
        }
    }
}

impl ScoringConfig {
    pub fn staleness(&self) -> Duration {
        Duration::minutes(i64::from(self.staleness_minutes))
    }

    pub fn horizon(&self) -> Duration {
        Duration::hours(i64::from(self.horizon_hours))
    }

    pub fn wind_relevance(&self) -> Duration {
        Duration::hours(i64::from(self.wind_relevance_hours))
    }

    pub fn medium_confidence(&self) -> Duration {
        Duration::hours(i64::from(self.medium_confidence_hours))
    }

    /// Highest score a slot can reach before penalties.
    pub fn max_score(&self) -> f64 {
        self.cloud_weight + self.visibility_weight + self.darkness_weight
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| {
            Err(EngineError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.staleness_minutes == 0 {
            return invalid("staleness_minutes must be positive");
        }
        if self.horizon_hours == 0 {
            return invalid("horizon_hours must be positive");
        }
        let numbers = [
            self.visibility_min_km,
            self.visibility_ceiling_km,
            self.wind_threshold_ms,
            self.wind_penalty_per_ms,
            self.wind_penalty_max,
            self.merge_tolerance,
            self.cloud_weight,
            self.visibility_weight,
            self.darkness_weight,
            self.moon_penalty_max,
        ];
        if numbers.iter().any(|n| !n.is_finite() || *n < 0.0) {
            return invalid("thresholds and weights must be finite and non-negative");
        }
        if self.visibility_ceiling_km <= self.visibility_min_km {
            return invalid("visibility_ceiling_km must exceed visibility_min_km");
        }
        if self.max_score() <= 0.0 || self.max_score() > 100.0 {
            return invalid("cloud, visibility and darkness weights must sum to (0, 100]");
        }
        Ok(())
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the forecast document is written.
    pub output: PathBuf,
    pub location: Location,
    pub local: LocalSourceConfig,
    pub online: OnlineSourceConfig,
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("/srv/doro_lab_projects/skycam/forecast.json"),
            location: Location::default(),
            local: LocalSourceConfig::default(),
            online: OnlineSourceConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the default location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("at", "doro-lab", "skywatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.online.api_key = Some(api_key);
    }

    /// API key from `OPENWEATHER_API_KEY`, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        pick_api_key(std::env::var(API_KEY_ENV).ok(), self.online.api_key.as_deref())
    }

    pub fn is_online_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

fn pick_api_key(env: Option<String>, file: Option<&str>) -> Option<String> {
    env.filter(|k| !k.trim().is_empty())
        .or_else(|| file.filter(|k| !k.trim().is_empty()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scoring_is_valid() {
        ScoringConfig::default().validate().expect("defaults must validate");
        assert_eq!(ScoringConfig::default().max_score(), 100.0);
    }

    #[test]
    fn ceiling_below_minimum_is_rejected() {
        let cfg = ScoringConfig {
            visibility_ceiling_km: 1.0,
            ..ScoringConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("visibility_ceiling_km"));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let cfg = ScoringConfig {
            cloud_weight: -1.0,
            ..ScoringConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_key_takes_precedence() {
        assert_eq!(pick_api_key(Some("ENV".into()), Some("FILE")), Some("ENV".to_string()));
        assert_eq!(pick_api_key(Some("  ".into()), Some("FILE")), Some("FILE".to_string()));
        assert_eq!(pick_api_key(None, Some("")), None);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            output = "/tmp/forecast.json"

            [location]
            name = "Backyard"
            latitude = 47.0
            longitude = 15.4

            [scoring]
            wind_threshold_ms = 6.5
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(cfg.location.name, "Backyard");
        assert_eq!(cfg.location.elevation_m, None);
        assert_eq!(cfg.scoring.wind_threshold_ms, 6.5);
        assert_eq!(cfg.scoring.staleness_minutes, 10);
        assert_eq!(cfg.local.kind, SensorKind::File);
        assert_eq!(cfg.output, PathBuf::from("/tmp/forecast.json"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());
        cfg.local.kind = SensorKind::Http;
        cfg.local.url = Some("http://localhost:8080/weather".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.online.api_key.as_deref(), Some("KEY"));
        assert_eq!(loaded.local.kind, SensorKind::Http);
        assert_eq!(loaded.scoring, ScoringConfig::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.location, Location::default());
    }
}
