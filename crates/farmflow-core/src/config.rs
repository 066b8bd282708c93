//! Farmflow configuration system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FarmflowError, Result};
use crate::types::ConnectionParams;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmflowConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl FarmflowConfig {
    /// Load config from the default path (~/.farmflow/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FarmflowError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FarmflowError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FarmflowError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Farmflow home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".farmflow")
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// How to reach the automation engine and the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    #[serde(default)]
    pub connection: ConnectionParams,
}

fn default_cli_path() -> String { "maa".into() }
fn default_adb_path() -> String { "adb".into() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            adb_path: default_adb_path(),
            connection: ConnectionParams::default(),
        }
    }
}

/// Dispatch policy of the flow scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Extra attempts for a start-up task whose liveness probe fails.
    #[serde(default = "default_startup_retries")]
    pub startup_retries: u32,
    /// Settle delay after a start-up task.
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
    /// Settle delay after any other task.
    #[serde(default = "default_task_delay_secs")]
    pub task_delay_secs: u64,
    /// How often to ask the engine whether it is still busy.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on busy polling for one task.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    /// Daemon tick.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Flow document key the daemon and `run` use by default.
    #[serde(default = "default_flow_key")]
    pub flow_key: String,
}

fn default_startup_retries() -> u32 { 2 }
fn default_startup_delay_secs() -> u64 { 10 }
fn default_task_delay_secs() -> u64 { 3 }
fn default_poll_interval_secs() -> u64 { 5 }
fn default_max_wait_secs() -> u64 { 3 * 60 * 60 }
fn default_check_interval_secs() -> u64 { 30 }
fn default_flow_key() -> String { "task_flow".into() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            startup_retries: default_startup_retries(),
            startup_delay_secs: default_startup_delay_secs(),
            task_delay_secs: default_task_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
            check_interval_secs: default_check_interval_secs(),
            flow_key: default_flow_key(),
        }
    }
}

impl SchedulerConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn task_delay(&self) -> Duration {
        Duration::from_secs(self.task_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Knobs of the training planner's coarse run estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Expected drops of the target material per run.
    #[serde(default = "default_drop_rate")]
    pub assumed_drop_rate: f64,
    #[serde(default = "default_sanity_per_run")]
    pub sanity_per_run: u64,
    /// Materials whose name ends with one of these are farmed as packs, never crafted.
    #[serde(default = "default_group_suffixes")]
    pub group_suffixes: Vec<String>,
    /// Extra material ids farmed as packs.
    #[serde(default)]
    pub group_ids: Vec<String>,
    /// Material id or name → stage id. Wins over the material's own best stage.
    #[serde(default = "default_stage_overrides")]
    pub stage_overrides: BTreeMap<String, String>,
    /// Hour (server local) at which the game day rolls over.
    #[serde(default = "default_reset_hour")]
    pub reset_hour: u32,
    /// Path of the game data bundle (materials, recipes, rank tables).
    #[serde(default = "default_game_data")]
    pub game_data: String,
}

fn default_drop_rate() -> f64 { 0.5 }
fn default_sanity_per_run() -> u64 { 20 }
fn default_group_suffixes() -> Vec<String> { vec!["组".into(), " Pack".into()] }
fn default_reset_hour() -> u32 { 4 }
fn default_game_data() -> String { "~/.farmflow/gamedata.json".into() }

fn default_stage_overrides() -> BTreeMap<String, String> {
    // Resource stages whose materials have no story-stage best drop.
    BTreeMap::from([
        ("2001".to_string(), "LS-6".to_string()),
        ("2002".to_string(), "LS-6".to_string()),
        ("2003".to_string(), "LS-6".to_string()),
        ("2004".to_string(), "LS-6".to_string()),
        ("4001".to_string(), "CE-6".to_string()),
        ("3301".to_string(), "CA-5".to_string()),
        ("3302".to_string(), "CA-5".to_string()),
        ("3303".to_string(), "CA-5".to_string()),
    ])
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            assumed_drop_rate: default_drop_rate(),
            sanity_per_run: default_sanity_per_run(),
            group_suffixes: default_group_suffixes(),
            group_ids: Vec::new(),
            stage_overrides: default_stage_overrides(),
            reset_hour: default_reset_hour(),
            game_data: default_game_data(),
        }
    }
}

/// Where documents and run history live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_history_db")]
    pub history_db: String,
}

fn default_data_dir() -> String { "~/.farmflow/data".into() }
fn default_history_db() -> String { "~/.farmflow/history.db".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_db: default_history_db(),
        }
    }
}

/// Notification targets. Every configured target receives every summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram: Option<TelegramNotifyConfig>,
    #[serde(default)]
    pub discord: Option<DiscordNotifyConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookNotifyConfig>,
    /// Only notify when something failed or was skipped.
    #[serde(default)]
    pub only_on_problems: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramNotifyConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordNotifyConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotifyConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

fn bool_true() -> bool { true }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FarmflowConfig::default();
        assert_eq!(config.scheduler.startup_retries, 2);
        assert_eq!(config.engine.cli_path, "maa");
        assert_eq!(config.scheduler.flow_key, "task_flow");
        assert!((config.planner.assumed_drop_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [engine]
            cli_path = "/opt/maa/maa"

            [engine.connection]
            address = "emulator-5554"

            [scheduler]
            startup_retries = 4
            task_delay_secs = 1

            [planner]
            sanity_per_run = 21

            [notify.discord]
            webhook_url = "https://discord.example/hook"
        "#;

        let config: FarmflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.cli_path, "/opt/maa/maa");
        assert_eq!(config.engine.connection.address, "emulator-5554");
        assert_eq!(config.engine.connection.client_type, "Official");
        assert_eq!(config.scheduler.startup_retries, 4);
        assert_eq!(config.scheduler.task_delay(), Duration::from_secs(1));
        assert_eq!(config.scheduler.startup_delay_secs, 10);
        assert_eq!(config.planner.sanity_per_run, 21);
        assert!(config.notify.discord.unwrap().enabled);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: FarmflowConfig = toml::from_str("").unwrap();
        assert_eq!(config.scheduler.check_interval_secs, 30);
        assert_eq!(config.planner.reset_hour, 4);
        assert!(config.notify.telegram.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join("farmflow-test-config");
        let path = dir.join("config.toml");
        let mut config = FarmflowConfig::default();
        config.scheduler.startup_retries = 7;
        config.save_to(&path).unwrap();

        let loaded = FarmflowConfig::load_from(&path).unwrap();
        assert_eq!(loaded.scheduler.startup_retries, 7);
        assert_eq!(loaded.planner.stage_overrides.get("4001").map(String::as_str), Some("CE-6"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_home_dir() {
        let home = FarmflowConfig::home_dir();
        assert!(home.to_string_lossy().contains("farmflow"));
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let mut config = SchedulerConfig::default();
        config.poll_interval_secs = 0;
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
