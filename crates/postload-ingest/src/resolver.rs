//! Connection resolver
//!
//! Maps a (species, assembly) pair plus the cluster configuration onto the
//! coordinates of exactly one clinical database. Pure: no connection is
//! opened here.

use serde::Serialize;
use tracing::debug;

use crate::config::ClusterConfig;
use crate::error::ConfigurationError;
use crate::params::Assembly;

/// Credentials of the target database
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Where one species/assembly's clinical annotations are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyTarget {
    pub species: String,
    pub assembly: Assembly,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Credentials,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Compose `<prefix>_<species>_<assembly-lowercased>_<version>`
pub fn database_name(prefix: &str, species: &str, assembly: Assembly, version: &str) -> String {
    format!(
        "{}_{}_{}_{}",
        prefix,
        species,
        assembly.as_str().to_lowercase(),
        version
    )
}

/// Resolve the store coordinates for `species` on `assembly`
pub fn resolve(
    species: &str,
    assembly: Assembly,
    cluster: &ClusterConfig,
) -> Result<AssemblyTarget, ConfigurationError> {
    let species = cluster.species_aliases.get(species).ok_or_else(|| {
        ConfigurationError::new(format!(
            "Unknown species '{}'. Configured species: {}",
            species,
            cluster
                .species_aliases
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let db = &cluster.database;
    let host = required(db.host.as_deref(), "database host")?;
    let port = parse_port(db.port.as_deref())?;
    let user = required(db.user.as_deref(), "database user")?;
    let password = db
        .password
        .clone()
        .ok_or_else(|| ConfigurationError::new("Missing database password in cluster configuration"))?;
    let version = required(cluster.version.as_deref(), "release version")?;

    if cluster.max_connections == 0 {
        return Err(ConfigurationError::new("max_connections must be greater than 0"));
    }

    let target = AssemblyTarget {
        species: species.clone(),
        assembly,
        host: host.to_string(),
        port,
        database: database_name(&cluster.database_prefix, species, assembly, version),
        credentials: Credentials {
            user: user.to_string(),
            password,
        },
        max_connections: cluster.max_connections,
        connect_timeout_secs: cluster.connect_timeout_secs,
    };

    debug!(
        species = %target.species,
        assembly = %target.assembly,
        host = %target.host,
        port = target.port,
        database = %target.database,
        "Resolved clinical store target"
    );

    Ok(target)
}

fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str, ConfigurationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigurationError::new(format!(
            "Missing {} in cluster configuration",
            what
        ))),
    }
}

fn parse_port(value: Option<&str>) -> Result<u16, ConfigurationError> {
    let raw = required(value, "database port")?;
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigurationError::new(format!(
            "Invalid database port '{}': expected an integer between 1 and 65535",
            raw
        ))),
    }
}
