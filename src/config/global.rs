//! Global configuration.
//!
//! Loaded from ~/.config/gridload/gridload.yml or .gridload.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::RunnerSection;

/// Global configuration for gridload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Log level override (falls back to RUST_LOG).
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Grid client settings.
    pub client: ClientConfig,

    /// Per-runner map test sections.
    #[serde(rename = "map-tests")]
    pub map_tests: MapTestsConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .gridload.yml in current directory
    /// 3. ~/.config/gridload/gridload.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".gridload.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .gridload.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .gridload.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("gridload").join("gridload.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

/// Grid client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Cluster name passed to the grid client.
    #[serde(rename = "cluster-name")]
    pub cluster_name: String,

    /// Member addresses (host:port).
    pub members: Vec<String>,

    /// Deadline for acquiring a map handle, in milliseconds.
    #[serde(rename = "get-map-timeout-ms")]
    pub get_map_timeout_ms: u64,

    /// Fixed client identity; generated at startup if absent.
    pub identity: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster_name: "dev".to_string(),
            members: vec!["127.0.0.1:5701".to_string()],
            get_map_timeout_ms: 10_000,
            identity: None,
        }
    }
}

impl ClientConfig {
    /// Replace unusable values with defaults, warning about each one.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.cluster_name.trim().is_empty() {
            log::warn!(
                "client.cluster-name is empty -- using default '{}' instead",
                defaults.cluster_name
            );
            self.cluster_name = defaults.cluster_name;
        }
        if self.members.is_empty() {
            log::warn!("client.members is empty -- using default {:?} instead", defaults.members);
            self.members = defaults.members;
        }
        if self.get_map_timeout_ms == 0 {
            log::warn!(
                "client.get-map-timeout-ms is 0 -- using default {} instead",
                defaults.get_map_timeout_ms
            );
            self.get_map_timeout_ms = defaults.get_map_timeout_ms;
        }
        self
    }
}

/// Sections for all map runners.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MapTestsConfig {
    pub load: LoadRunnerSection,
}

/// Section of the synthetic-payload load runner.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadRunnerSection {
    #[serde(flatten)]
    pub runner: RunnerSection,

    #[serde(rename = "num-entries-per-map")]
    pub num_entries_per_map: u32,

    #[serde(rename = "payload-size-bytes")]
    pub payload_size_bytes: u32,
}

impl Default for LoadRunnerSection {
    fn default() -> Self {
        Self {
            runner: RunnerSection::default(),
            num_entries_per_map: 1000,
            payload_size_bytes: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.client.cluster_name, "dev");
        assert_eq!(config.client.get_map_timeout_ms, 10_000);
        assert_eq!(config.map_tests.load.num_entries_per_map, 1000);
        assert!(config.map_tests.load.runner.enabled);
    }

    #[test]
    fn test_client_section_keys() {
        let yaml = serde_yaml::to_string(&ClientConfig::default()).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let keys: Vec<_> = value
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect();
        assert_eq!(keys, vec!["cluster-name", "members", "get-map-timeout-ms", "identity"]);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
log-level: debug
client:
  cluster-name: stress
  members:
    - grid-0:5701
    - grid-1:5701
map-tests:
  load:
    enabled: true
    num-maps: 4
    num-entries-per-map: 50
    payload-size-bytes: 16
"#;
        let config: GlobalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.client.cluster_name, "stress");
        assert_eq!(config.client.members.len(), 2);
        assert_eq!(config.map_tests.load.runner.num_maps, 4);
        assert_eq!(config.map_tests.load.num_entries_per_map, 50);
        // Other fields should have defaults
        assert_eq!(config.map_tests.load.runner.num_runs, 100);
        assert_eq!(config.client.get_map_timeout_ms, 10_000);
    }

    #[test]
    fn test_sanitized_substitutes_defaults() {
        let client = ClientConfig {
            cluster_name: "  ".to_string(),
            members: vec![],
            get_map_timeout_ms: 0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(client.cluster_name, "dev");
        assert_eq!(client.members, vec!["127.0.0.1:5701".to_string()]);
        assert_eq!(client.get_map_timeout_ms, 10_000);
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "client:\n  cluster-name: from-file").unwrap();

        let config = GlobalConfig::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.client.cluster_name, "from-file");
    }

    #[test]
    fn test_load_from_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/gridload.yml");
        assert!(GlobalConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "client: [not, a, map").unwrap();
        assert!(GlobalConfig::load_from_file(file.path()).is_err());
    }
}
