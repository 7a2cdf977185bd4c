//! Cluster configuration
//!
//! Connection parameters shared by every species/assembly database of a
//! cluster. Loaded once per invocation and passed by value into the
//! connection resolver; there is no process-wide configuration state.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional configuration file (`.json` or `.toml`)
//! 3. `.env` and environment variables (`CELLBASE_DB_HOST`, ...)

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigurationError;

// ============================================================================
// Defaults
// ============================================================================

/// Default prefix of every database name in the cluster.
pub const DEFAULT_DATABASE_PREFIX: &str = "cellbase";

/// Default species key.
pub const DEFAULT_SPECIES: &str = "hsapiens";

/// Default maximum pooled connections per species database.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connection parameters of the database cluster
///
/// `port` is kept as text and may be written as a string or an integer;
/// the resolver is responsible for rejecting malformed values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    #[serde(deserialize_with = "port_text_or_number")]
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

fn port_text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Port>::deserialize(deserializer)?.map(|port| match port {
        Port::Text(text) => text,
        Port::Number(number) => number.to_string(),
    }))
}

/// Configuration of the whole cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Release version appended to database names, e.g. `v3`
    pub version: Option<String>,
    pub database: DatabaseConfig,
    pub database_prefix: String,
    /// Species alias -> canonical species key
    pub species_aliases: BTreeMap<String, String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            version: None,
            database: DatabaseConfig::default(),
            database_prefix: DEFAULT_DATABASE_PREFIX.to_string(),
            species_aliases: BTreeMap::from([(
                DEFAULT_SPECIES.to_string(),
                DEFAULT_SPECIES.to_string(),
            )]),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClusterConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        dotenvy::dotenv().ok();

        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        Ok(config.with_env_overrides())
    }

    /// Parse a configuration file; the format is chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::new(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| e.to_string()),
            Some("json") | None => serde_json::from_str(&content).map_err(|e| e.to_string()),
            Some(other) => Err(format!("unsupported configuration format '.{}'", other)),
        };

        parsed.map_err(|e| {
            ConfigurationError::new(format!(
                "Invalid configuration file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Apply `CELLBASE_*` environment variables on top of `self`
    pub fn with_env_overrides(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok();

        if let Some(host) = var("CELLBASE_DB_HOST") {
            self.database.host = Some(host);
        }
        if let Some(port) = var("CELLBASE_DB_PORT") {
            self.database.port = Some(port);
        }
        if let Some(user) = var("CELLBASE_DB_USER") {
            self.database.user = Some(user);
        }
        if let Some(password) = var("CELLBASE_DB_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(version) = var("CELLBASE_VERSION") {
            self.version = Some(version);
        }
        if let Some(prefix) = var("CELLBASE_DB_PREFIX") {
            self.database_prefix = prefix;
        }

        self
    }

    /// Register an extra species alias
    pub fn with_species_alias(mut self, alias: impl Into<String>, species: impl Into<String>) -> Self {
        self.species_aliases.insert(alias.into(), species.into());
        self
    }
}
