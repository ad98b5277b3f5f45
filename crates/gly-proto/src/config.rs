use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Where the episode catalog is fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub url: String,
    #[serde(default = "default_catalog_timeout_ms")]
    pub timeout_ms: u64,
}

/// Live feed and its now-playing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_live_stream_url")]
    pub stream_url: String,
    /// Static label shown while no metadata is available.
    #[serde(default = "default_live_title")]
    pub title: String,
    /// JSON resource with `title` / `subtitle`.  No poller when unset.
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_metadata_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Target directory.  Defaults to the platform download folder.
    #[serde(default = "platform::default_download_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Minute choices offered by the sleep-timer menu.
    #[serde(default = "default_timer_choices")]
    pub choices: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            timeout_ms: default_catalog_timeout_ms(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            stream_url: default_live_stream_url(),
            title: default_live_title(),
            metadata_url: None,
            poll_interval_secs: default_poll_interval_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            request_timeout_ms: default_metadata_timeout_ms(),
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            dir: platform::default_download_dir(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            choices: default_timer_choices(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://www.gly.co.il/_next/data/GeWFXmhG87d3ioX0F5VbE/program.json?id=3194".to_string()
}

fn default_catalog_timeout_ms() -> u64 {
    10_000
}

fn default_live_stream_url() -> String {
    "https://cdn.cybercdn.live/Galei_Israel/Live/icecast.audio".to_string()
}

fn default_live_title() -> String {
    "Galei Israel (live)".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    1_500
}

fn default_metadata_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_timer_choices() -> Vec<u32> {
    vec![15, 30, 60]
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            info!("config: wrote defaults to {}", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("config: loaded {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.catalog.url.starts_with("https://"));
        assert_eq!(config.catalog.timeout_ms, 10_000);
        assert_eq!(config.live.poll_interval_secs, 30);
        assert!(config.live.metadata_url.is_none());
        assert_eq!(config.timer.choices, vec![15, 30, 60]);
        assert_eq!(config.http.port, 8990);
        assert_eq!(config.http.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [catalog]
            url = "https://example.org/program.json"

            [live]
            metadata_url = "https://example.org/now.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog.url, "https://example.org/program.json");
        assert_eq!(config.catalog.timeout_ms, 10_000);
        assert_eq!(
            config.live.metadata_url.as_deref(),
            Some("https://example.org/now.json")
        );
        assert_eq!(config.live.poll_interval_secs, 30);
        assert!(config.http.enabled);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.live.stream_url, config.live.stream_url);
        assert_eq!(back.downloads.dir, config.downloads.dir);
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.http.port, 8990);
        assert!(path.exists());

        std::fs::write(&path, "[http]\nport = 9100\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.http.port, 9100);
        assert_eq!(config.http.bind_address, "127.0.0.1");
    }
}
