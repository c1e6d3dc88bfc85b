use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config as cfg;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegionConfig {
    #[serde(default = "RegionConfig::default_name")]
    pub name: String,
}

impl RegionConfig {
    fn default_name() -> String {
        "us-east-1".to_string()
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
        }
    }
}

/// Shared outbound call budget.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ThrottleConfig {
    /// Calls allowed in flight at once
    #[serde(default = "ThrottleConfig::default_concurrency")]
    pub concurrency: usize,
    /// Calls allowed to start per interval
    #[serde(default = "ThrottleConfig::default_rate")]
    pub rate: usize,
    #[serde(default = "ThrottleConfig::default_rate_interval_ms")]
    pub rate_interval_ms: u64,
}

impl ThrottleConfig {
    fn default_concurrency() -> usize {
        40
    }

    fn default_rate() -> usize {
        300
    }

    fn default_rate_interval_ms() -> u64 {
        1000
    }

    pub fn rate_interval(&self) -> Duration {
        Duration::from_millis(self.rate_interval_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            concurrency: Self::default_concurrency(),
            rate: Self::default_rate(),
            rate_interval_ms: Self::default_rate_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RefreshConfig {
    #[serde(default = "RefreshConfig::default_region_interval_secs")]
    pub region_interval_secs: u64,
    #[serde(default = "RefreshConfig::default_instance_interval_secs")]
    pub instance_interval_secs: u64,
    /// Width of the window each metrics query aggregates over
    #[serde(default = "RefreshConfig::default_metrics_period_minutes")]
    pub metrics_period_minutes: u32,
    #[serde(default = "RefreshConfig::default_poll_metrics")]
    pub poll_metrics: bool,
}

impl RefreshConfig {
    fn default_region_interval_secs() -> u64 {
        300
    }

    fn default_instance_interval_secs() -> u64 {
        60
    }

    fn default_metrics_period_minutes() -> u32 {
        10
    }

    fn default_poll_metrics() -> bool {
        true
    }

    pub fn region_interval(&self) -> Duration {
        Duration::from_secs(self.region_interval_secs)
    }

    pub fn instance_interval(&self) -> Duration {
        Duration::from_secs(self.instance_interval_secs)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            region_interval_secs: Self::default_region_interval_secs(),
            instance_interval_secs: Self::default_instance_interval_secs(),
            metrics_period_minutes: Self::default_metrics_period_minutes(),
            poll_metrics: Self::default_poll_metrics(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiscoveryConfig {
    /// Directory holding one JSON fixture per resource kind
    #[serde(default = "DiscoveryConfig::default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    #[serde(default)]
    pub prices_file: Option<PathBuf>,
}

impl DiscoveryConfig {
    fn default_snapshot_dir() -> PathBuf {
        PathBuf::from("snapshot")
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: Self::default_snapshot_dir(),
            prices_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            region: RegionConfig::default(),
            throttle: ThrottleConfig::default(),
            refresh: RefreshConfig::default(),
            logging: LoggingConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        env::var("INFRAGRAPH_ENV")
            .ok()
            .or_else(|| env::var("APP_ENV").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.region.name.trim().is_empty(),
            "region.name cannot be empty"
        );
        anyhow::ensure!(
            self.throttle.concurrency > 0,
            "throttle.concurrency must be > 0"
        );
        anyhow::ensure!(self.throttle.rate > 0, "throttle.rate must be > 0");
        anyhow::ensure!(
            self.throttle.rate_interval_ms > 0,
            "throttle.rate_interval_ms must be > 0"
        );
        anyhow::ensure!(
            self.refresh.region_interval_secs > 0,
            "refresh.region_interval_secs must be > 0"
        );
        anyhow::ensure!(
            self.refresh.instance_interval_secs > 0,
            "refresh.instance_interval_secs must be > 0"
        );
        anyhow::ensure!(
            self.refresh.metrics_period_minutes > 0,
            "refresh.metrics_period_minutes must be > 0"
        );
        Ok(())
    }
}

/// Loads layered settings from a config directory and the environment.
#[derive(Debug)]
pub struct ConfigManager {
    settings: Settings,
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: Option<PathBuf>, env_override: Option<String>) -> Result<Self> {
        let env_name = env_override.unwrap_or_else(Settings::default_env);
        let config_dir = config_dir.unwrap_or_else(Self::default_config_dir);
        let settings = Self::load_from_sources(&config_dir, &env_name)?;
        settings.validate()?;
        Ok(Self {
            settings,
            config_dir,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the default configuration directory.
    ///
    /// Priority order:
    /// 1. ~/.infragraph/
    /// 2. ./config/
    /// 3. Current directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".infragraph");
            if user_dir.exists() {
                info!("Using config directory: {:?}", user_dir);
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            info!("Using config directory: {:?}", project_config);
            return project_config;
        }

        info!("Using config directory: {:?}", cwd);
        cwd
    }

    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let settings: Settings = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(cfg::File::from(config_dir.join("default.json")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.json", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(cfg::Environment::with_prefix("INFRAGRAPH").separator("__"))
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_follow_the_driver_cadence() {
        let settings = Settings::default();
        assert_eq!(settings.throttle.concurrency, 40);
        assert_eq!(settings.throttle.rate, 300);
        assert_eq!(settings.throttle.rate_interval(), Duration::from_secs(1));
        assert_eq!(settings.refresh.region_interval(), Duration::from_secs(300));
        assert_eq!(settings.refresh.instance_interval(), Duration::from_secs(60));
        assert_eq!(settings.refresh.metrics_period_minutes, 10);
        assert_eq!(settings.logging.level, "info");
        settings.validate().unwrap();
    }

    #[test]
    fn files_are_layered_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[region]\nname = \"eu-west-1\"\n[throttle]\nconcurrency = 8\nrate = 50\n",
        )
        .unwrap();
        fs::write(dir.path().join("staging.toml"), "[throttle]\nrate = 20\n").unwrap();
        fs::write(
            dir.path().join("local.toml"),
            "[refresh]\nregion_interval_secs = 30\n",
        )
        .unwrap();

        let settings = ConfigManager::load_from_sources(dir.path(), "staging").unwrap();
        assert_eq!(settings.region.name, "eu-west-1");
        assert_eq!(settings.throttle.concurrency, 8);
        assert_eq!(settings.throttle.rate, 20);
        assert_eq!(settings.refresh.region_interval_secs, 30);
        assert_eq!(settings.refresh.instance_interval_secs, 60);
    }

    #[test]
    fn validation_rejects_zero_budgets() {
        let mut settings = Settings::default();
        settings.throttle.concurrency = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.throttle.rate_interval_ms = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.region.name = "  ".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn manager_validates_loaded_settings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.toml"), "[throttle]\nrate = 0\n").unwrap();
        let err = ConfigManager::new(Some(dir.path().to_path_buf()), Some("test".into()))
            .unwrap_err();
        assert!(err.to_string().contains("throttle.rate"));
    }
}
