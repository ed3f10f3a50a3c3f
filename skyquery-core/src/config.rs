//! Configuration file management for skyquery.
//!
//! Reads/writes `~/.skyquery/config.yaml` with engine limits, feed
//! credentials, and API server address.

use std::path::{Path, PathBuf};

use crate::distance::EARTH_MEAN_RADIUS_KM;
use crate::types::QueryError;

/// Largest query radius accepted by default.
pub const DEFAULT_MAX_RADIUS_NM: f64 = 250.0;

pub const DEFAULT_FEED_URL: &str = "https://opensky-network.org/api";

const REDACTED: &str = "***";

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub engine: EngineConfig,
    pub feed: FeedConfig,
    pub server: ServerConfig,
}

/// Limits and constants held by the area query engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub max_radius_nm: f64,
    pub earth_radius_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_radius_nm: DEFAULT_MAX_RADIUS_NM,
            earth_radius_km: EARTH_MEAN_RADIUS_KM,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            base_url: DEFAULT_FEED_URL.into(),
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

impl FeedConfig {
    /// Credentials are only usable as a pair.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

impl Config {
    /// Copy safe to print: the feed password is masked.
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        if config.feed.password.is_some() {
            config.feed.password = Some(REDACTED.into());
        }
        config
    }
}

/// Get the config directory path (`~/.skyquery/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".skyquery")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.skyquery/config.yaml`.
///
/// Returns default config if file doesn't exist.
pub fn load_config() -> Config {
    load_config_from(&config_file())
}

/// Load config from an explicit path, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text),
        Err(_) => Config::default(),
    }
}

/// Save config to `~/.skyquery/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, QueryError> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), QueryError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| QueryError::Config(e.to_string()))?;
    }
    std::fs::write(path, serialize_config(config)).map_err(|e| QueryError::Config(e.to_string()))
}

/// Parse simple YAML-like config text. Unknown keys and unparsable values
/// keep their defaults.
pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<&str> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then_some(key);
            continue;
        }

        match (current_section, key) {
            (Some("engine"), "max_radius_nm") => {
                if let Some(v) = parse_float_value(val) {
                    config.engine.max_radius_nm = v;
                }
            }
            (Some("engine"), "earth_radius_km") => {
                if let Some(v) = parse_float_value(val) {
                    config.engine.earth_radius_km = v;
                }
            }
            (Some("feed"), "base_url") => {
                if let Some(v) = parse_string_value(val) {
                    config.feed.base_url = v;
                }
            }
            (Some("feed"), "username") => config.feed.username = parse_string_value(val),
            (Some("feed"), "password") => config.feed.password = parse_string_value(val),
            (Some("feed"), "timeout_secs") => {
                if let Ok(v) = val.parse::<u64>() {
                    config.feed.timeout_secs = v;
                }
            }
            (Some("server"), "host") => {
                if let Some(v) = parse_string_value(val) {
                    config.server.host = v;
                }
            }
            (Some("server"), "port") => {
                if let Ok(v) = val.parse::<u16>() {
                    config.server.port = v;
                }
            }
            _ => {}
        }
    }

    config
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_float_value(val: &str) -> Option<f64> {
    val.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# skyquery configuration".to_string(), String::new()];

    lines.push("engine:".into());
    lines.push(format!("  max_radius_nm: {}", config.engine.max_radius_nm));
    lines.push(format!("  earth_radius_km: {}", config.engine.earth_radius_km));
    lines.push(String::new());

    lines.push("feed:".into());
    lines.push(format!("  base_url: \"{}\"", config.feed.base_url));
    match &config.feed.username {
        Some(u) => lines.push(format!("  username: \"{u}\"")),
        None => lines.push("  username: null".into()),
    }
    match &config.feed.password {
        Some(p) => lines.push(format!("  password: \"{p}\"")),
        None => lines.push("  password: null".into()),
    }
    lines.push(format!("  timeout_secs: {}", config.feed.timeout_secs));
    lines.push(String::new());

    lines.push("server:".into());
    lines.push(format!("  host: \"{}\"", config.server.host));
    lines.push(format!("  port: {}", config.server.port));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.max_radius_nm, 250.0);
        assert_eq!(config.engine.earth_radius_km, 6371.0);
        assert_eq!(config.feed.base_url, "https://opensky-network.org/api");
        assert_eq!(config.feed.timeout_secs, 30);
        assert_eq!(config.server.port, 5000);
        assert!(config.feed.credentials().is_none());
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
engine:
  max_radius_nm: 100
  earth_radius_km: 6378.137

feed:
  base_url: "http://localhost:9000/api"
  username: "pilot"
  password: 'secret'
  timeout_secs: 10

server:
  host: "0.0.0.0"
  port: 9090
"#;
        let config = parse_config(text);
        assert_eq!(config.engine.max_radius_nm, 100.0);
        assert_eq!(config.engine.earth_radius_km, 6378.137);
        assert_eq!(config.feed.base_url, "http://localhost:9000/api");
        assert_eq!(config.feed.credentials(), Some(("pilot", "secret")));
        assert_eq!(config.feed.timeout_secs, 10);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_parse_config_null_and_bad_values() {
        let text = r#"
engine:
  max_radius_nm: -5
feed:
  username: null
  password: ~
server:
  port: not-a-port
"#;
        let config = parse_config(text);
        assert_eq!(config.engine.max_radius_nm, 250.0);
        assert!(config.feed.username.is_none());
        assert!(config.feed.password.is_none());
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_half_credentials_are_unusable() {
        let mut feed = FeedConfig::default();
        feed.username = Some("pilot".into());
        assert!(feed.credentials().is_none());
    }

    #[test]
    fn test_redacted_masks_password() {
        let mut config = Config::default();
        config.feed.username = Some("pilot".into());
        config.feed.password = Some("hunter2".into());

        let text = serialize_config(&config.redacted());
        assert!(!text.contains("hunter2"));
        assert!(text.contains("password: \"***\""));
        assert!(text.contains("username: \"pilot\""));
        assert_eq!(config.feed.password.as_deref(), Some("hunter2"));

        assert!(Config::default().redacted().feed.password.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.engine.max_radius_nm = 120.5;
        config.feed.username = Some("pilot".into());
        config.feed.password = Some("secret".into());
        config.server.port = 8081;

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config_from(&dir.path().join("absent.yaml")), Config::default());
    }
}
