//! # Configuration
//!
//! TOML configuration for the dispatcher, the player store and the binary.
//!
//! ## Sections
//!
//! - [`ServerConfig`] - permission prefix and console display name
//! - [`StorageConfig`] - data directory and autosave behaviour
//! - [`LoggingConfig`] - log level and log files
//! - [`ModulesConfig`] - which command modules are enabled
//! - [`WarmupConfig`] - what interrupts a pending warmup
//! - [`HomesConfig`] - home quota fallback
//! - `[commands.<name>]` - per-command [`CommandOverride`] of cooldown, warmup and cost
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcadmin::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("permission prefix: {}", config.server.permission_prefix);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub warmup: WarmupConfig,
    #[serde(default)]
    pub homes: HomesConfig,
    /// Keyed by primary command name, e.g. `"lightning"` or `"mail send"`.
    #[serde(default)]
    pub commands: HashMap<String, CommandOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Root of every permission node, e.g. `mcadmin` in `mcadmin.home.base`.
    pub permission_prefix: String,
    #[serde(default = "default_console_name")]
    pub console_name: String,
}

fn default_console_name() -> String {
    "Console".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Save a player's document when they log out.
    #[serde(default = "default_true")]
    pub autosave_on_logout: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Administrative actions (`security` log target) are copied here when set.
    #[serde(default)]
    pub security_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Applies to every module not listed in `enabled`.
    #[serde(default = "default_true")]
    pub default_enabled: bool,
    #[serde(default)]
    pub enabled: HashMap<String, bool>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            default_enabled: true,
            enabled: HashMap::new(),
        }
    }
}

impl ModulesConfig {
    pub fn is_enabled(&self, module: &str) -> bool {
        self.enabled
            .get(&module.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default_enabled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WarmupConfig {
    #[serde(default = "default_true")]
    pub cancel_on_move: bool,
    #[serde(default = "default_true")]
    pub cancel_on_damage: bool,
    /// Running any other command cancels pending warmups.
    #[serde(default)]
    pub cancel_on_command: bool,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            cancel_on_move: true,
            cancel_on_damage: true,
            cancel_on_command: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HomesConfig {
    /// Home limit when the permission backend has no `home-count` option for the player.
    #[serde(default = "default_home_limit")]
    pub default_limit: u32,
}

fn default_home_limit() -> u32 {
    1
}

impl Default for HomesConfig {
    fn default() -> Self {
        Self {
            default_limit: default_home_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOverride {
    #[serde(default)]
    pub cooldown_seconds: Option<u64>,
    #[serde(default)]
    pub warmup_seconds: Option<u64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl CommandOverride {
    pub fn cooldown(&self) -> Option<Duration> {
        self.cooldown_seconds.map(Duration::from_secs)
    }

    pub fn warmup(&self) -> Option<Duration> {
        self.warmup_seconds.map(Duration::from_secs)
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::parse(&content).map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let prefix = &self.server.permission_prefix;
        if prefix.trim().is_empty() {
            bail!("server.permission_prefix must not be empty");
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
            || prefix.starts_with('.')
            || prefix.contains("..")
        {
            bail!("server.permission_prefix '{}' is not a valid node prefix", prefix);
        }
        if self.storage.data_dir.trim().is_empty() {
            bail!("storage.data_dir must not be empty");
        }
        for (name, o) in &self.commands {
            if let Some(cost) = o.cost {
                if !cost.is_finite() || cost < 0.0 {
                    bail!("commands.{}.cost must be a non-negative number", name);
                }
            }
        }
        Ok(())
    }

    /// Override block for a command's primary name, if configured.
    pub fn command(&self, name: &str) -> Option<&CommandOverride> {
        self.commands.get(&name.to_ascii_lowercase())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                permission_prefix: "mcadmin".to_string(),
                console_name: default_console_name(),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                autosave_on_logout: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("mcadmin.log".to_string()),
                security_file: None,
            },
            modules: ModulesConfig::default(),
            warmup: WarmupConfig::default(),
            homes: HomesConfig::default(),
            commands: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.server.permission_prefix, "mcadmin");
        assert!(parsed.modules.is_enabled("homes"));
        assert_eq!(parsed.homes.default_limit, 1);
    }

    #[test]
    fn parses_modules_and_command_overrides() {
        let text = r#"
[server]
permission_prefix = "nucleus"

[storage]
data_dir = "/tmp/data"

[logging]
level = "debug"

[modules]
default_enabled = false
[modules.enabled]
fun = true

[commands.lightning]
cooldown_seconds = 30
cost = 5.0

[commands."mail send"]
warmup_seconds = 2
"#;
        let config = Config::parse(text).unwrap();
        assert!(config.modules.is_enabled("FUN"));
        assert!(!config.modules.is_enabled("kick"));
        assert_eq!(config.command("lightning").unwrap().cooldown(), Some(Duration::from_secs(30)));
        assert_eq!(config.command("mail send").unwrap().warmup_seconds, Some(2));
        assert!(config.storage.autosave_on_logout);
        assert!(config.warmup.cancel_on_move);
    }

    #[test]
    fn rejects_negative_cost_and_bad_prefix() {
        let mut config = Config::default();
        config.commands.insert(
            "kick".into(),
            CommandOverride {
                cost: Some(-1.0),
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.permission_prefix = "bad prefix".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn create_default_writes_a_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        tokio_test::block_on(Config::create_default(path)).unwrap();
        let loaded = tokio_test::block_on(Config::load(path)).unwrap();
        assert_eq!(loaded.storage.data_dir, "./data");
        assert!(tokio_test::block_on(Config::load("/nonexistent/mcadmin.toml")).is_err());
    }
}
