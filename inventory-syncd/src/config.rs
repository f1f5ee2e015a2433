use std::path::{Path, PathBuf};
use serde::Deserialize;
use anyhow::{Context, Result};

/// Environment variable that overrides `netbox.token`
pub const TOKEN_ENV: &str = "INVENTORY_SYNC_NETBOX_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub netbox: NetboxConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Clone, Deserialize)]
pub struct NetboxConfig {
    /// Base URL of the inventory system, e.g. `https://netbox.example.com`
    pub endpoint: String,
    pub token: String,
}

impl std::fmt::Debug for NetboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetboxConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/inventory-sync/inventory.db")
}

fn default_channel_capacity() -> usize {
    64
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                config.netbox.token = token;
            }
        }

        Ok(config)
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;

        if config.ingest.channel_capacity == 0 {
            anyhow::bail!("ingest.channel_capacity must be greater than zero");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_apply() {
        let config = Config::parse(
            r#"
            [netbox]
            endpoint = "http://netbox.local"
            token = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.netbox.endpoint, "http://netbox.local");
        assert_eq!(config.store.db_path, default_db_path());
        assert_eq!(config.ingest.channel_capacity, 64);
        assert_eq!(config.api.listen, "[::]:8054");
    }

    #[test]
    fn test_missing_netbox_section_fails() {
        assert!(Config::parse("[store]\ndb_path = \"/tmp/x.db\"\n").is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Config::parse(
            r#"
            [netbox]
            endpoint = "http://netbox.local"
            token = "abc"
            [ingest]
            channel_capacity = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[netbox]\nendpoint = \"http://nb\"\ntoken = \"t\"\n[store]\ndb_path = \"/tmp/inv.db\"\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/inv.db"));
        assert!(!format!("{:?}", config.netbox).contains("\"t\""));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("/nonexistent/syncd.toml").is_err());
    }
}
