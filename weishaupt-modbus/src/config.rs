use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::Catalog;
use crate::error::ConfigError;
use crate::poller::Availability;
use crate::powermap::{GridPowerMap, PowerMap};

/// Host configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Host name or IP address of the heat pump
    pub host: String,

    /// Modbus TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between refresh cycles
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Upper bound on a whole refresh cycle in seconds
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,

    /// Connect and request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Installed optional heating circuits (2..=5)
    #[serde(default)]
    pub heating_circuits: Vec<u8>,

    /// JSON heating power map
    #[serde(default)]
    pub power_map: Option<PathBuf>,

    /// TOML catalog used instead of the built-in one
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

fn default_port() -> u16 {
    502
}
fn default_scan_interval() -> u64 {
    30
}
fn default_cycle_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    2000
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        for (key, value) in [
            ("scan_interval_secs", config.scan_interval_secs),
            ("cycle_timeout_secs", config.cycle_timeout_secs),
            ("request_timeout_ms", config.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration(key));
            }
        }
        config.availability()?;
        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn availability(&self) -> Result<Availability, ConfigError> {
        Availability::new(self.heating_circuits.iter().copied())
    }

    /// Configured catalog file, or the built-in register map.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.catalog {
            Some(path) => Catalog::from_file(path),
            None => Catalog::load(),
        }
    }

    pub fn load_power_map(&self) -> Result<Option<Arc<dyn PowerMap>>, ConfigError> {
        let Some(path) = &self.power_map else {
            return Ok(None);
        };
        let map: Arc<dyn PowerMap> = Arc::new(GridPowerMap::from_file(path)?);
        Ok(Some(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_toml_str(r#"host = "192.168.1.50""#).unwrap();
        assert_eq!(config.port, 502);
        assert_eq!(config.scan_interval(), Duration::from_secs(30));
        assert_eq!(config.cycle_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_millis(2000));
        assert!(config.heating_circuits.is_empty());
        assert_eq!(config.power_map, None);
        assert_eq!(config.catalog, None);
    }

    #[test]
    fn full_config() {
        let config = Config::from_toml_str(
            r#"
            host = "wbb.local"
            port = 5020
            scan_interval_secs = 60
            heating_circuits = [2, 3]
            power_map = "/etc/weishaupt/power_map.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 5020);
        assert_eq!(config.scan_interval_secs, 60);
        assert_eq!(config.power_map, Some(PathBuf::from("/etc/weishaupt/power_map.json")));

        let availability = config.availability().unwrap();
        assert!(availability.is_enabled(crate::item::Device::HeatingCircuit(3)));
        assert!(!availability.is_enabled(crate::item::Device::HeatingCircuit(4)));
    }

    #[test]
    fn rejects_bad_circuits_and_missing_host() {
        assert!(matches!(
            Config::from_toml_str("host = \"a\"\nheating_circuits = [1]"),
            Err(ConfigError::InvalidCircuit(1))
        ));
        assert!(matches!(Config::from_toml_str("port = 502"), Err(ConfigError::Toml(_))));
        assert!(matches!(
            Config::from_toml_str("host = \"a\"\nunknown_key = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn rejects_zero_durations() {
        for key in ["scan_interval_secs", "cycle_timeout_secs", "request_timeout_ms"] {
            let err = Config::from_toml_str(&format!("host = \"a\"\n{key} = 0")).unwrap_err();
            assert!(matches!(err, ConfigError::ZeroDuration(name) if name == key));
            assert_eq!(err.to_string(), format!("{key} must be greater than zero"));
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::from_file("/nonexistent/weishaupt.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/weishaupt.toml"));
    }

    #[test]
    fn builtin_catalog_without_catalog_file() {
        let config = Config::from_toml_str(r#"host = "wbb.local""#).unwrap();
        let catalog = config.load_catalog().unwrap();
        assert!(catalog.get("outside_temperature").is_some());
        assert!(config.load_power_map().unwrap().is_none());
    }
}
