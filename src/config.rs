//! Configuration
//!
//! Read from `<config dir>/turtle-relay/config.toml` when present, then
//! overridden by `TURTLE_RELAY_*` environment variables. The supervisor uses
//! the same variables to pass settings down to the renderer process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Ticks per second of the renderer loop
pub const ENV_TICK_HZ: &str = "TURTLE_RELAY_TICK_HZ";
/// Default `call` timeout in milliseconds
pub const ENV_QUERY_TIMEOUT_MS: &str = "TURTLE_RELAY_QUERY_TIMEOUT_MS";
/// Path of the renderer binary
pub const ENV_RENDERER: &str = "TURTLE_RELAY_RENDERER";
/// Tracing filter directives
pub const ENV_LOG: &str = "TURTLE_RELAY_LOG";
/// Session id handed to the renderer process for log correlation
pub const ENV_SESSION: &str = "TURTLE_RELAY_SESSION";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub renderer: RendererConfig,
    pub control: ControlConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Renderer loop frequency
    pub tick_rate_hz: u32,

    /// Explicit renderer binary; located automatically when unset
    pub binary: Option<PathBuf>,

    /// Tracing filter for the renderer process
    pub log_filter: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            binary: None,
            log_filter: None,
        }
    }
}

impl RendererConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// How long `call` waits for its reply
    pub query_timeout_ms: u64,

    /// How long startup waits for the renderer's handshake reply
    pub handshake_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 5_000,
            handshake_timeout_ms: 10_000,
        }
    }
}

impl ControlConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Default configuration directory
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("turtle-relay"))
        .unwrap_or_else(|| PathBuf::from(".turtle-relay"))
}

impl Config {
    /// Load the default config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = config_dir().join("config.toml");

        let mut config = if config_path.exists() {
            Self::read_file(&config_path)?
        } else {
            tracing::debug!("No config at {:?}, using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path, without environment overrides
    pub fn from_path(path: &Path) -> Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply `TURTLE_RELAY_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_TICK_HZ) {
            self.renderer.tick_rate_hz = parse_env(ENV_TICK_HZ, &value)?;
        }
        if let Some(value) = lookup(ENV_QUERY_TIMEOUT_MS) {
            self.control.query_timeout_ms = parse_env(ENV_QUERY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_RENDERER) {
            self.renderer.binary = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_LOG) {
            self.renderer.log_filter = Some(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.renderer.tick_rate_hz) {
            return Err(Error::Config(format!(
                "tick_rate_hz must be between 1 and 1000, got {}",
                self.renderer.tick_rate_hz
            )));
        }
        if self.control.query_timeout_ms == 0 {
            return Err(Error::Config("query_timeout_ms must be non-zero".to_string()));
        }
        if self.control.handshake_timeout_ms == 0 {
            return Err(Error::Config("handshake_timeout_ms must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[renderer]
tick_rate_hz = 60
binary = "/opt/turtle/turtle-renderer"

[control]
query_timeout_ms = 250
"#;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.renderer.tick_rate_hz, 60);
        assert_eq!(
            config.renderer.binary,
            Some(PathBuf::from("/opt/turtle/turtle-renderer"))
        );
        assert_eq!(config.control.query_timeout(), Duration::from_millis(250));
        // Missing keys keep their defaults
        assert_eq!(config.control.handshake_timeout_ms, 10_000);
        assert_eq!(config.renderer.log_filter, None);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.renderer.tick_period(), Duration::from_secs_f64(1.0 / 30.0));
        assert_eq!(config.control.query_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[renderer]\ntick_rate_hz = 0\n").unwrap();
        assert!(matches!(Config::from_path(file.path()), Err(Error::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[renderer\n").unwrap();
        assert!(matches!(Config::from_path(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_TICK_HZ, "120"),
            (ENV_QUERY_TIMEOUT_MS, " 50 "),
            (ENV_RENDERER, "/tmp/renderer"),
            (ENV_LOG, "turtle_relay=trace"),
        ]);

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.renderer.tick_rate_hz, 120);
        assert_eq!(config.control.query_timeout_ms, 50);
        assert_eq!(config.renderer.binary, Some(PathBuf::from("/tmp/renderer")));
        assert_eq!(config.renderer.log_filter.as_deref(), Some("turtle_relay=trace"));
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == ENV_TICK_HZ).then(|| "fast".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TICK_HZ));
    }
}
