use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::resolver::{CandidateSet, SchemaAdaptiveResolver, DEFAULT_RESULT_LIMIT};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DISCOVERY_CACHE_TTL_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FarmdeskConfig {
    pub database: Option<String>,
    pub port: Option<u16>,
    pub jwt_secret: Option<String>,
    /// Role worker tokens must carry; an empty string accepts any role
    pub worker_role: Option<String>,
    pub result_limit: Option<usize>,
    pub query_timeout_ms: Option<u64>,
    /// 0 disables the discovery cache
    pub discovery_cache_ttl_secs: Option<u64>,
    pub reminder_ttl_secs: Option<u64>,
    pub reminder_capacity: Option<usize>,
    pub candidates: Option<CandidateSet>,
}

impl FarmdeskConfig {
    /// Apply `FARMDESK_DATABASE`, `FARMDESK_PORT` and `JWT_SECRET`
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply the environment overrides as read through `lookup`
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(database) = lookup("FARMDESK_DATABASE") {
            self.database = Some(database);
        }
        if let Some(port) = lookup("FARMDESK_PORT") {
            self.port = Some(port.parse().map_err(|e| anyhow::anyhow!("invalid FARMDESK_PORT {port:?}: {e}"))?);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt_secret = Some(secret);
        }
        Ok(self)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.as_deref().map(PathBuf::from).unwrap_or_else(default_database_path)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn worker_role(&self) -> Option<String> {
        match self.worker_role.as_deref() {
            None => Some(crate::auth::DEFAULT_WORKER_ROLE.to_string()),
            Some("") => None,
            Some(role) => Some(role.to_string()),
        }
    }

    pub fn result_limit(&self) -> usize {
        self.result_limit.unwrap_or(DEFAULT_RESULT_LIMIT)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.unwrap_or(DEFAULT_QUERY_TIMEOUT_MS))
    }

    pub fn discovery_cache_ttl(&self) -> Option<Duration> {
        match self.discovery_cache_ttl_secs.unwrap_or(DEFAULT_DISCOVERY_CACHE_TTL_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn reminder_ttl(&self) -> Duration {
        self.reminder_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(crate::reminders::DEFAULT_REMINDER_TTL)
    }

    pub fn reminder_capacity(&self) -> usize {
        self.reminder_capacity.unwrap_or(crate::reminders::DEFAULT_REMINDER_CAPACITY)
    }

    pub fn candidates(&self) -> CandidateSet {
        self.candidates.clone().unwrap_or_default()
    }

    /// Resolver with the configured candidates, limit and discovery cache
    pub fn resolver(&self) -> SchemaAdaptiveResolver {
        let resolver = SchemaAdaptiveResolver::new(self.candidates()).with_limit(self.result_limit());
        match self.discovery_cache_ttl() {
            Some(ttl) => resolver.with_discovery_cache(ttl),
            None => resolver,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("farmdesk.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("farmdesk.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<FarmdeskConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: FarmdeskConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &FarmdeskConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Write the config for `init` and return the effective settings.
///
/// Only values already in the file and the given flags are written;
/// environment overrides apply to the returned settings alone.
pub fn init_config(
    path: &Path,
    database: Option<String>,
    jwt_secret: Option<String>,
    force: bool,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<FarmdeskConfig> {
    let mut file = load_config(Some(path))?.unwrap_or_default();
    if database.is_some() {
        file.database = database;
    }
    if jwt_secret.is_some() {
        file.jwt_secret = jwt_secret;
    }

    write_config(path, &file, force)?;
    file.with_overrides_from(env)
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
