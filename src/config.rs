//! Configuration for the strix binary.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (STRIX_RPC_URL, STRIX_POLL_INTERVAL_SECS)
//! 2. Config file (.strix/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .strix/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rpc::LogFilter;
use crate::sources::PollSettings;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logs: LogFilter,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcConfig {
    /// Node HTTP endpoint
    pub url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub max_consecutive_failures: Option<u32>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    /// Events buffered per source
    pub event_buffer: Option<usize>,
    pub max_blocks_per_poll: Option<u64>,
}

/// Environment overrides, read once at load time
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    rpc_url: Option<String>,
    poll_interval_secs: Option<u64>,
}

impl EnvOverrides {
    fn from_env() -> Result<Self> {
        let poll_interval_secs = match std::env::var("STRIX_POLL_INTERVAL_SECS") {
            Ok(raw) => Some(
                raw.parse()
                    .with_context(|| format!("Invalid STRIX_POLL_INTERVAL_SECS: {}", raw))?,
            ),
            Err(_) => None,
        };
        Ok(Self {
            rpc_url: std::env::var("STRIX_RPC_URL").ok(),
            poll_interval_secs,
        })
    }
}

/// Resolved configuration with defaults applied
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Node endpoint, if configured anywhere
    pub rpc_url: Option<String>,
    pub poll_interval_secs: u64,
    pub max_consecutive_failures: u32,
    pub request_timeout_secs: u64,
    pub event_buffer: usize,
    pub max_blocks_per_poll: u64,
    /// Filter for the log source
    pub log_filter: LogFilter,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let poll = PollSettings::default();
        Self {
            rpc_url: None,
            poll_interval_secs: poll.interval.as_secs(),
            max_consecutive_failures: poll.max_consecutive_failures,
            request_timeout_secs: 10,
            event_buffer: poll.event_buffer,
            max_blocks_per_poll: poll.max_blocks_per_poll,
            log_filter: LogFilter::default(),
            config_file: None,
        }
    }
}

impl ResolvedConfig {
    /// Polling behaviour for the chain sources
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            max_consecutive_failures: self.max_consecutive_failures,
            max_blocks_per_poll: self.max_blocks_per_poll,
            event_buffer: self.event_buffer,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".strix").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Layer file values and environment overrides over the defaults
fn resolve(file: Option<(PathBuf, ConfigFile)>, env: EnvOverrides) -> ResolvedConfig {
    let mut config = ResolvedConfig::default();

    if let Some((path, file)) = file {
        config.rpc_url = file.rpc.url;
        if let Some(secs) = file.rpc.poll_interval_secs {
            config.poll_interval_secs = secs;
        }
        if let Some(max) = file.rpc.max_consecutive_failures {
            config.max_consecutive_failures = max;
        }
        if let Some(secs) = file.rpc.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(buffer) = file.sources.event_buffer {
            config.event_buffer = buffer;
        }
        if let Some(blocks) = file.sources.max_blocks_per_poll {
            config.max_blocks_per_poll = blocks;
        }
        config.log_filter = file.logs;
        config.config_file = Some(path);
    }

    if let Some(url) = env.rpc_url {
        config.rpc_url = Some(url);
    }
    if let Some(secs) = env.poll_interval_secs {
        config.poll_interval_secs = secs;
    }

    config
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let file = match find_config_file() {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    Ok(resolve(file, EnvOverrides::from_env()?))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, body: &str) -> PathBuf {
        let dir = temp.path().join(".strix");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, EnvOverrides::default());
        assert_eq!(config.rpc_url, None);
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.max_consecutive_failures, 5);
        assert_eq!(config.event_buffer, 256);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1.0"
rpc:
  url: http://localhost:8545
  poll_interval_secs: 3
  max_consecutive_failures: 10
sources:
  event_buffer: 32
logs:
  addresses:
    - "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
  topics:
    - ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"]
"#,
        );

        let file = load_config_file(&path).unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.logs.addresses.len(), 1);
        assert_eq!(file.logs.topics[0].len(), 1);

        let config = resolve(Some((path.clone(), file)), EnvOverrides::default());
        assert_eq!(config.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.max_consecutive_failures, 10);
        assert_eq!(config.event_buffer, 32);
        // Untouched keys keep defaults
        assert_eq!(config.max_blocks_per_poll, 16);
        assert_eq!(config.config_file, Some(path));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1.0"
rpc:
  url: http://file:8545
  poll_interval_secs: 3
"#,
        );
        let file = load_config_file(&path).unwrap();
        let env = EnvOverrides {
            rpc_url: Some("http://env:8545".to_string()),
            poll_interval_secs: Some(30),
        };

        let config = resolve(Some((path, file)), env);
        assert_eq!(config.rpc_url.as_deref(), Some("http://env:8545"));
        assert_eq!(config.poll_interval_secs, 30);
    }

    #[test]
    fn test_poll_settings() {
        let config = ResolvedConfig {
            poll_interval_secs: 0,
            max_blocks_per_poll: 4,
            ..Default::default()
        };
        let settings = config.poll_settings();
        // Clamped to one second
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert_eq!(settings.max_blocks_per_poll, 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "version: [unterminated");
        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
