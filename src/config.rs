use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use serde::{Deserialize, Serialize};

use crate::ports::catalog::ProviderInstance;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_cache_dir")]
    cache_dir: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes served for an open-ended range request (`bytes=N-`).
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    /// `{id}` is replaced with the track id.
    pub source_url_template: String,
    pub thumbnail_url_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub instances_url: String,
    pub fallback_url: String,
    /// Instance names that are never selected.
    pub blocklist: Vec<String>,
    pub ping_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// 0 disables periodic refreshes.
    pub refresh_interval_secs: u64,
    pub extra_instances: Vec<ProviderInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Markers tried in order when extracting an item id from a provider URL.
    pub id_markers: Vec<String>,
}

fn default_cache_dir() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("tuneproxy").to_string_lossy().to_string())
        .unwrap_or_else(|| "./cache".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            server: ServerConfig::default(),
            stream: StreamConfig::default(),
            media: MediaConfig::default(),
            provider: ProviderConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { chunk_size: 500_000 }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            source_url_template: "https://www.youtube.com/watch?v={id}".to_string(),
            thumbnail_url_template: "https://i3.ytimg.com/vi/{id}/maxresdefault.jpg".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            instances_url: "https://piped-instances.kavin.rocks/".to_string(),
            fallback_url: "https://pipedapi.kavin.rocks".to_string(),
            blocklist: Vec::new(),
            ping_timeout_secs: 5,
            request_timeout_secs: 10,
            refresh_interval_secs: 0,
            extra_instances: vec![ProviderInstance {
                name: "wireway.ch".to_string(),
                api_url: "https://pipedapi.wireway.ch".to_string(),
            }],
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            id_markers: vec!["list=".to_string(), "v=".to_string()],
        }
    }
}

impl ProviderConfig {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("tuneproxy").join("config.toml"))
    }

    /// Load the default config file, or built-in defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config to the default path, unless a file is already there
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| eyre!("No config directory available"))?;
        if path.exists() {
            return Err(eyre!("Config file already exists: {}", path.display()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .wrap_err(format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    pub fn cache_dir_path(&self) -> PathBuf {
        Self::expand_path(&self.cache_dir)
    }

    pub fn set_cache_dir(&mut self, dir: &Path) {
        self.cache_dir = dir.to_string_lossy().to_string();
    }
}
