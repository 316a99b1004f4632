use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{nlog_debug, Error, Result};

/// Shipped placeholder credential. The server warns at startup until the
/// operator replaces it.
pub const DEFAULT_API_KEY: &str = "change-me";

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_BIT_RATE: &str = "8M";
const DEFAULT_MAX_SIZE: u32 = 1280;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared secret required on every request.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Root for uploads/, pulled_files/ and recordings/. Defaults to ~/.nexusd.
    pub storage_root: Option<String>,
    /// Root for backups/ and photos/. Defaults to the storage root.
    pub backup_root: Option<String>,
    /// Video bit rate cap passed to the capture tool when mirroring.
    #[serde(default = "default_bit_rate")]
    pub mirror_bit_rate: String,
    /// Resolution cap passed to the capture tool when mirroring.
    #[serde(default = "default_max_size")]
    pub mirror_max_size: u32,
    /// Path to the desktop companion client executable, if installed.
    pub client_path: Option<String>,
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bit_rate() -> String {
    DEFAULT_BIT_RATE.to_string()
}

fn default_max_size() -> u32 {
    DEFAULT_MAX_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            port: DEFAULT_PORT,
            storage_root: None,
            backup_root: None,
            mirror_bit_rate: default_bit_rate(),
            mirror_max_size: DEFAULT_MAX_SIZE,
            client_path: None,
        }
    }
}

impl Config {
    pub fn nexus_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".nexusd"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::nexus_dir()?.join("nexusd.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        nlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            nlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        nlog_debug!(
            "Config loaded: port={}, storage_root={:?}, backup_root={:?}",
            config.port,
            config.storage_root,
            config.backup_root
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::nexus_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        nlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn is_default_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }

    pub fn storage_root(&self) -> Result<PathBuf> {
        match &self.storage_root {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Self::nexus_dir(),
        }
    }

    pub fn backup_root(&self) -> Result<PathBuf> {
        match &self.backup_root {
            Some(dir) => Ok(expand_tilde(dir)),
            None => self.storage_root(),
        }
    }

    /// Host directory files pushed to the device are read from.
    pub fn uploads_dir(&self) -> Result<PathBuf> {
        Ok(self.storage_root()?.join("uploads"))
    }

    /// Host directory pulled files and screenshots land in.
    pub fn pulled_dir(&self) -> Result<PathBuf> {
        Ok(self.storage_root()?.join("pulled_files"))
    }

    /// Host directory screen recordings are written to.
    pub fn recordings_dir(&self) -> Result<PathBuf> {
        Ok(self.storage_root()?.join("recordings"))
    }

    pub fn backups_dir(&self) -> Result<PathBuf> {
        Ok(self.backup_root()?.join("backups"))
    }

    pub fn photos_dir(&self) -> Result<PathBuf> {
        Ok(self.backup_root()?.join("photos"))
    }

    /// Create every storage root up front. Called once at startup so the
    /// dispatch paths can assume the directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        let dirs = [
            Self::nexus_dir()?,
            self.uploads_dir()?,
            self.pulled_dir()?,
            self.recordings_dir()?,
            self.backups_dir()?,
            self.photos_dir()?,
        ];
        for dir in &dirs {
            if !dir.exists() {
                nlog_debug!("Creating directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
