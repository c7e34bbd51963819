use serde::Deserialize;
use wsrbac_authz::GateConfig;
use wsrbac_cache::CacheConfig;
use wsrbac_database::DatabaseConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Volatile in-process store, for local development.
    Memory,
}

/// Server settings: defaults, then `wsrbac.toml` if present, then
/// `WSRBAC_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub known_user_capacity: u64,
}

impl ServerSettings {
    pub fn load() -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("storage", "postgres")?
            .set_default("known_user_capacity", 100_000)?
            .add_source(::config::File::with_name("wsrbac").required(false))
            .add_source(::config::Environment::with_prefix("WSRBAC"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerSettings,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub gate: GateConfig,
}

impl Config {
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let gate = GateConfig::from_env();
        let cache = CacheConfig {
            ttl: gate.snapshot_ttl,
            ..CacheConfig::from_env()
        };

        Ok(Self {
            server: ServerSettings::load()?,
            database: DatabaseConfig::from_env(),
            cache,
            gate,
        })
    }
}
