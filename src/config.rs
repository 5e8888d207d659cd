//! Engine configuration, loadable from TOML. Every field has a default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::pip::DEFAULT_BOUNDARY_TOLERANCE;

pub const DEFAULT_TIGERWEB_ENDPOINT: &str =
    "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/tigerWMS_Current/MapServer/2/query";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GeofenceConfig {
    pub remote: RemoteConfig,
    pub postal: PostalConfig,
    pub containment: ContainmentConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    /// How long a fetched document stays fresh in the cache
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            timeout_secs: 10,
            max_redirects: 1,
            user_agent: format!("geofence/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RemoteConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PostalConfig {
    /// ArcGIS REST query endpoint of the ZCTA layer
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Largest number of unique codes accepted in one import
    pub max_batch: usize,
    /// Concurrent boundary queries; 1 means sequential
    pub concurrency: usize,
}

impl Default for PostalConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TIGERWEB_ENDPOINT.to_string(),
            timeout_secs: 15,
            max_batch: 150,
            concurrency: 1,
        }
    }
}

impl PostalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContainmentConfig {
    /// Degrees; used by tolerance-based lookups
    pub boundary_tolerance: f64,
}

impl Default for ContainmentConfig {
    fn default() -> Self {
        Self {
            boundary_tolerance: DEFAULT_BOUNDARY_TOLERANCE,
        }
    }
}

impl GeofenceConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GeofenceConfig =
            toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }
}
