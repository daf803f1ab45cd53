//! Runtime configuration.
//!
//! The config file is produced by the interactive setup flow, which is not
//! part of this daemon; here it is only loaded, and a missing file is a
//! startup error pointing the user at setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection and light assignment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address of the Hue bridge on the local network.
    pub bridge_ip: String,
    /// Application key registered with the bridge.
    pub api_key: String,
    /// Light driven by the first small knob.
    pub bulb1_id: String,
    /// Light driven by the second small knob.
    pub bulb2_id: String,
    /// Where device state snapshots live; defaults next to the config.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl Config {
    /// Platform config file location.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(windows) {
            std::env::var("LOCALAPPDATA")
                .context("LOCALAPPDATA environment variable not set")?
        } else {
            format!(
                "{}/.config",
                std::env::var("HOME").context("HOME environment variable not set")?
            )
        };
        Ok(PathBuf::from(config_dir)
            .join("huedeck")
            .join("config.json"))
    }

    /// Load the config file, failing with guidance if it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "config not found at {}; run the setup flow first",
                path.display()
            )
        })?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Backup directory, explicit or defaulted beside the config file.
    pub fn backup_dir(&self, config_path: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("backups"),
        }
    }

    /// Ids of every controlled light.
    pub fn light_ids(&self) -> Vec<String> {
        vec![self.bulb1_id.clone(), self.bulb2_id.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses_minimal_file() {
        let json = r#"{
            "bridge_ip": "192.168.1.10",
            "api_key": "secret",
            "bulb1_id": "1",
            "bulb2_id": "4"
        }"#;
        let config: Config = serde_json::from_str(json).expect("parse");
        assert_eq!(config.bridge_ip, "192.168.1.10");
        assert_eq!(config.light_ids(), vec!["1", "4"]);
        assert!(config.backup_dir.is_none());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let json = r#"{
            "bridge_ip": "192.168.1.10",
            "api_key": "secret",
            "bulb1_id": "1",
            "bulb2_id": "4",
            "bridgeIp": "typo"
        }"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_missing_config_error_mentions_setup() {
        let err = Config::load(Path::new("/nonexistent/huedeck/config.json"))
            .expect_err("must fail");
        assert!(format!("{err:#}").contains("setup"));
    }

    #[test]
    fn test_backup_dir_defaults_beside_config() {
        let json = r#"{
            "bridge_ip": "10.0.0.2",
            "api_key": "k",
            "bulb1_id": "1",
            "bulb2_id": "2"
        }"#;
        let config: Config = serde_json::from_str(json).expect("parse");
        let dir = config.backup_dir(Path::new("/home/u/.config/huedeck/config.json"));
        assert_eq!(dir, PathBuf::from("/home/u/.config/huedeck/backups"));
    }

    #[test]
    fn test_backup_dir_override_wins() {
        let json = r#"{
            "bridge_ip": "10.0.0.2",
            "api_key": "k",
            "bulb1_id": "1",
            "bulb2_id": "2",
            "backup_dir": "/var/lib/huedeck"
        }"#;
        let config: Config = serde_json::from_str(json).expect("parse");
        let dir = config.backup_dir(Path::new("/etc/huedeck/config.json"));
        assert_eq!(dir, PathBuf::from("/var/lib/huedeck"));
    }
}
