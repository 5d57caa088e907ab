//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Shared primitives and utilities for the core runtime."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9464))
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_owned()
}

fn default_connect_retry_initial() -> Duration {
    Duration::from_millis(250)
}

fn default_connect_retry_max() -> Duration {
    Duration::from_secs(30)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(10)
}

/// Primary configuration object for the splitwatch runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "SPLITWATCH_CONFIG";

    /// Load configuration from disk, respecting the `SPLITWATCH_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `SPLITWATCH_CONFIG` path must exist. Otherwise the first
    /// existing candidate wins, and defaults apply when none exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        Self::resolve(None, candidates)
    }

    /// Like [`AppConfig::load_with_source`], except that `explicit` (the
    /// `--config` flag) takes precedence over `SPLITWATCH_CONFIG` and must
    /// exist.
    pub fn resolve<P: AsRef<Path>>(
        explicit: Option<&Path>,
        candidates: &[P],
    ) -> Result<LoadedAppConfig> {
        Self::resolve_with_env(explicit, std::env::var(Self::ENV_CONFIG_PATH).ok(), candidates)
    }

    fn resolve_with_env<P: AsRef<Path>>(
        explicit: Option<&Path>,
        env_path: Option<String>,
        candidates: &[P],
    ) -> Result<LoadedAppConfig> {
        let required = explicit.map(Path::to_path_buf).or_else(|| {
            env_path
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
        });
        if let Some(path) = required {
            let config = Self::from_path(&path)?;
            return Ok(LoadedAppConfig {
                config,
                source: Some(path),
            });
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!(
            inspected = %candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "no configuration file found; using defaults"
        );
        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.timer.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log file; stdout only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
    /// Browser assets served for any non-API path.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

/// Record store routing and primary connection settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    /// Environment variable consulted before `database_url`.
    #[serde(default = "default_database_url_env")]
    pub database_url_env: String,
    #[serde(default = "default_connect_retry_initial")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect_retry_initial: Duration,
    #[serde(default = "default_connect_retry_max")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect_retry_max: Duration,
    /// Give up connecting after this many failures; 0 retries forever.
    #[serde(default)]
    pub connect_attempts: u32,
    #[serde(default = "default_call_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub call_timeout: Duration,
    /// How long a failed primary is bypassed; zero retries it on every call.
    #[serde(default)]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub unhealthy_cooldown: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_url_env: default_database_url_env(),
            connect_retry_initial: default_connect_retry_initial(),
            connect_retry_max: default_connect_retry_max(),
            connect_attempts: 0,
            call_timeout: default_call_timeout(),
            unhealthy_cooldown: Duration::ZERO,
        }
    }
}

impl StoreConfig {
    /// Resolve the primary connection string: environment first, then file.
    pub fn resolve_database_url(&self) -> Option<String> {
        std::env::var(&self.database_url_env)
            .ok()
            .or_else(|| self.database_url.clone())
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.call_timeout.is_zero() {
            return Err(anyhow!("store call_timeout must be greater than zero"));
        }
        if self.connect_retry_initial.is_zero() {
            return Err(anyhow!(
                "store connect_retry_initial must be greater than zero"
            ));
        }
        if self.connect_retry_initial > self.connect_retry_max {
            return Err(anyhow!(
                "store connect_retry_initial ({:?}) exceeds connect_retry_max ({:?})",
                self.connect_retry_initial,
                self.connect_retry_max
            ));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
        }
    }
}

impl TimerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(anyhow!("timer tick_interval must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.timer.tick_interval, Duration::from_millis(10));
        assert_eq!(config.store.call_timeout, Duration::from_secs(5));
        assert_eq!(config.store.unhealthy_cooldown, Duration::ZERO);
        assert_eq!(config.api.listen.port(), 5000);
        assert!(matches!(config.logging.format, LogFormat::StructuredJson));
    }

    #[test]
    fn durations_parse_as_milliseconds() {
        let config: AppConfig = r#"
            [store]
            database_url = "sqlite://records.db"
            call_timeout = 1500
            unhealthy_cooldown = 2000

            [timer]
            tick_interval = 16
        "#
        .parse()
        .unwrap();
        assert_eq!(config.store.call_timeout, Duration::from_millis(1500));
        assert_eq!(config.store.unhealthy_cooldown, Duration::from_secs(2));
        assert_eq!(config.timer.tick_interval, Duration::from_millis(16));
        assert_eq!(
            config.store.database_url.as_deref(),
            Some("sqlite://records.db")
        );
    }

    #[test]
    fn zero_tick_is_rejected() {
        let err = "[timer]\ntick_interval = 0".parse::<AppConfig>().unwrap_err();
        assert!(format!("{err:#}").contains("tick_interval"));
    }

    #[test]
    fn inverted_retry_bounds_are_rejected() {
        let err = "[store]\nconnect_retry_initial = 5000\nconnect_retry_max = 100"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(format!("{err:#}").contains("connect_retry_max"));
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let loaded = AppConfig::load_with_source(&[dir.path().join("absent.toml")]).unwrap();
        assert!(loaded.source.is_none());
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("splitwatch.toml");
        fs::write(&path, "[timer]\ntick_interval = 20\n").unwrap();
        let loaded =
            AppConfig::load_with_source(&[dir.path().join("absent.toml"), path.clone()]).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.timer.tick_interval, Duration::from_millis(20));
    }

    #[test]
    fn explicit_path_beats_environment_and_candidates() {
        let dir = tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let from_env = dir.path().join("env.toml");
        let candidate = dir.path().join("candidate.toml");
        fs::write(&explicit, "[timer]\ntick_interval = 30\n").unwrap();
        fs::write(&from_env, "[timer]\ntick_interval = 40\n").unwrap();
        fs::write(&candidate, "[timer]\ntick_interval = 50\n").unwrap();

        let loaded = AppConfig::resolve_with_env(
            Some(explicit.as_path()),
            Some(from_env.display().to_string()),
            &[candidate.clone()],
        )
        .unwrap();
        assert_eq!(loaded.source.as_deref(), Some(explicit.as_path()));
        assert_eq!(loaded.config.timer.tick_interval, Duration::from_millis(30));

        let loaded =
            AppConfig::resolve_with_env(None, Some(from_env.display().to_string()), &[candidate])
                .unwrap();
        assert_eq!(loaded.source.as_deref(), Some(from_env.as_path()));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join("candidate.toml");
        fs::write(&candidate, "").unwrap();
        let err = AppConfig::resolve_with_env(
            Some(dir.path().join("absent.toml").as_path()),
            None,
            &[candidate],
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"), "{err:#}");
    }

    #[test]
    fn database_url_from_file_when_env_unset() {
        let config = StoreConfig {
            database_url: Some("  sqlite://file.db ".into()),
            database_url_env: "SPLITWATCH_TEST_UNSET_DATABASE_URL".into(),
            ..StoreConfig::default()
        };
        assert_eq!(
            config.resolve_database_url().as_deref(),
            Some("sqlite://file.db")
        );

        let blank = StoreConfig {
            database_url: Some("   ".into()),
            database_url_env: "SPLITWATCH_TEST_UNSET_DATABASE_URL".into(),
            ..StoreConfig::default()
        };
        assert!(blank.resolve_database_url().is_none());
    }
}
