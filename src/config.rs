use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::fat32::Limits;

/// Runtime configuration, loaded from a TOML file. Every field has a
/// default so the program runs without any configuration present.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub card: CardConfig,
    pub limits: Limits,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    /// Base I/O port of the SD interface card.
    pub base_port: u16,
    /// Attempt cap for each phase of the card init sequence.
    pub init_attempts: u32,
    /// Whole bring-up retries (init + boot sector check) before giving up.
    pub boot_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Visible rows per navigator pane.
    pub pane_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            card: CardConfig::default(),
            limits: Limits::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        CardConfig {
            base_port: 0x300,
            init_attempts: 1000,
            boot_attempts: 10,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig { pane_rows: 22 }
    }
}

impl Config {
    /// Read a config file. A missing file yields the defaults; a file that
    /// exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Config::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        toml::from_str(&text).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.card.base_port, 0x300);
        assert_eq!(cfg.card.init_attempts, 1000);
        assert_eq!(cfg.card.boot_attempts, 10);
        assert_eq!(cfg.limits.max_chain_clusters, 1024);
        assert_eq!(cfg.limits.max_dir_entries, 128);
        assert_eq!(cfg.limits.max_tree_folders, 64);
        assert_eq!(cfg.limits.max_path_len, 80);
        assert_eq!(cfg.ui.pane_rows, 22);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.card.base_port, 0x300);
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sdnav.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "[card]").unwrap();
        writeln!(f, "base_port = 0x310").unwrap();
        writeln!(f, "[limits]").unwrap();
        writeln!(f, "max_tree_folders = 16").unwrap();
        drop(f);

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.card.base_port, 0x310);
        assert_eq!(cfg.card.init_attempts, 1000);
        assert_eq!(cfg.limits.max_tree_folders, 16);
        assert_eq!(cfg.limits.max_dir_entries, 128);
    }

    #[test]
    fn test_garbage_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sdnav.toml");
        fs::write(&path, "not = [valid").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
