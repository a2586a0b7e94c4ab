use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use hdmiplay_detect::ModeTool;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::HdmiplayError;
use crate::launcher::PlayerCommand;

/// Shipped defaults, also the template users copy.
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub probe: ProbeConfig,
    pub backends: BackendsConfig,
    pub mode_tool: ModeToolConfig,
    pub sysfs: SysfsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub executable: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub window_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendsConfig {
    /// Trial order for `--backend auto`.
    pub order: Vec<Backend>,
    pub framebuffer_device: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeToolConfig {
    pub executable: String,
    pub module: Option<String>,
    pub elevate: Option<String>,
    pub settle_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysfsConfig {
    pub root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

impl AppConfig {
    /// Load config from `explicit` if given, else the user file if it
    /// exists, else built-in defaults. Missing keys keep their defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, HdmiplayError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let user_path = Self::config_path();
                if !user_path.exists() {
                    return Ok(Self::default());
                }
                user_path
            }
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| HdmiplayError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| HdmiplayError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse a user file layered over the shipped defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let mut merged: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
        let user: toml::Table = toml::from_str(toml_str)?;
        merge_tables(&mut merged, user);
        toml::Value::Table(merged).try_into()
    }

    /// Path to user config file (XDG on Linux).
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "hdmiplay")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    pub fn player_command(&self) -> PlayerCommand {
        PlayerCommand {
            executable: self.player.executable.clone(),
            args: self.player.args.clone(),
        }
    }

    pub fn probe_window(&self) -> Duration {
        Duration::from_millis(self.probe.window_ms)
    }

    pub fn mode_tool(&self) -> ModeTool {
        ModeTool {
            executable: self.mode_tool.executable.clone(),
            module: self.mode_tool.module.clone(),
            elevate: self.mode_tool.elevate.clone(),
        }
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.mode_tool.settle_ms)
    }
}

/// Overlay `over` onto `base`, descending into tables present in both.
fn merge_tables(base: &mut toml::Table, over: toml::Table) {
    for (key, value) in over {
        if let toml::Value::Table(over_table) = value {
            if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
                merge_tables(base_table, over_table);
                continue;
            }
            base.insert(key, toml::Value::Table(over_table));
        } else {
            base.insert(key, value);
        }
    }
}
