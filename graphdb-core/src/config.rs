//! Configuration loading: a JSON file plus an environment-variable overlay,
//! mirroring the container binary's `HELIX_DATA_DIR` / `HELIX_PORT`
//! convention without pulling in its vector/BM25/MCP surface.

use crate::engine::types::GraphError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A network address for a remote shard endpoint, recognized by the router
/// but otherwise opaque to this crate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShardEndpoint(pub String);

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Base filename stem for the three on-disk files.
    pub db_name: String,
    /// Directory holding the on-disk files. Overridden by `GRAPHDB_DATA_DIR`
    /// when set.
    pub data_dir: PathBuf,
    /// Router-only: the full, static list of shard endpoints.
    pub shard_endpoints: Option<Vec<ShardEndpoint>>,
    /// Router-only: how long a `query_id`'s visited set survives without
    /// being touched before it's evicted.
    #[serde(default, with = "duration_secs_opt")]
    pub neighbour_query_ttl: Option<Duration>,
}

impl Config {
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Err(GraphError::InvalidArgument(format!(
                "config file not found: {}",
                config_path.display()
            )));
        }
        let raw = std::fs::read_to_string(config_path)?;
        let mut config: Config = serde_json::from_str(&raw)
            .map_err(|e| GraphError::InvalidArgument(format!("malformed config: {e}")))?;
        config.apply_env_overlay();
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Applies the `GRAPHDB_DATA_DIR` / `GRAPHDB_LOG` overlay documented in
    /// the ambient stack. `GRAPHDB_LOG` is read by the binary that installs
    /// the `tracing` subscriber, not by `Config` itself; it's named here for
    /// discoverability.
    fn apply_env_overlay(&mut self) {
        if let Ok(dir) = std::env::var("GRAPHDB_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            db_name: "graphdb".to_string(),
            data_dir: PathBuf::from("."),
            shard_endpoints: None,
            neighbour_query_ttl: Some(Duration::from_secs(300)),
        };
        config.apply_env_overlay();
        config
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_has_sane_ttl() {
        let config = Config::default();
        assert_eq!(config.db_name, "graphdb");
        assert_eq!(config.neighbour_query_ttl, Some(Duration::from_secs(300)));
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"db_name": "shard0", "data_dir": "/tmp/shard0", "shard_endpoints": [], "neighbour_query_ttl": 60}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.db_name, "shard0");
        assert_eq!(config.neighbour_query_ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.shard_endpoints, Some(vec![]));
    }

    #[test]
    fn missing_config_file_is_invalid_argument() {
        let err = Config::from_file("/nonexistent/path/graphdb.json").unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }
}
