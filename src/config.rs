use crate::db::connector::Driver;
use crate::db::models::{Credential, PoolLimits};
use crate::error::DashboardError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "MEDSUPPLY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "MEDSUPPLY_";

/// Minimum decoded length accepted for the cookie secret.
pub const MIN_COOKIE_SECRET_LEN: usize = 64;

pub static CONFIG: LazyLock<Config> = LazyLock::new(|| match Config::load() {
    Ok(cfg) => cfg,
    Err(e) => panic!("FATAL: invalid configuration: {e}"),
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    /// Base64 secret the private cookie key is built from (64 bytes or more). A random key is
    /// generated when unset, which invalidates sessions on restart.
    pub cookie_secret: Option<String>,
    pub insecure_cookie: bool,
    pub session_idle_secs: u64,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            cookie_secret: None,
            insecure_cookie: false,
            session_idle_secs: 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    /// Database/catalog name for PostgreSQL, file path for SQLite.
    pub service_name: String,
    pub pool_min: u32,
    pub pool_max: u32,
    pub pool_increment: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub close_timeout_secs: u64,
    pub bootstrap: BootstrapConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            service_name: "medsupply".to_string(),
            pool_min: 1,
            pool_max: 3,
            pool_increment: 1,
            connect_timeout_secs: 10,
            acquire_timeout_secs: 5,
            close_timeout_secs: 5,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// Privileged login used only to enumerate candidate identities.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub identity_query: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            identity_query:
                "SELECT rolname::text FROM pg_roles WHERE rolcanlogin AND rolname NOT LIKE 'pg\\_%' ORDER BY rolname"
                    .to_string(),
        }
    }
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("identity_query", &self.identity_query)
            .finish()
    }
}

impl Config {
    /// Defaults, then the TOML file, then `MEDSUPPLY_*` environment variables.
    pub fn load() -> Result<Self, DashboardError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| DashboardError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        self.database.pool_limits()?;
        if self.basic.session_idle_secs == 0 {
            return Err(DashboardError::InvalidConfig(
                "session_idle_secs must be positive".to_string(),
            ));
        }
        if let Some(secret) = self.basic.cookie_secret.as_deref() {
            crate::middleware::session::decode_cookie_secret(secret)?;
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn pool_limits(&self) -> Result<PoolLimits, DashboardError> {
        PoolLimits::new(
            self.pool_min,
            self.pool_max,
            self.pool_increment,
            non_zero_secs("connect_timeout_secs", self.connect_timeout_secs)?,
            non_zero_secs("acquire_timeout_secs", self.acquire_timeout_secs)?,
            non_zero_secs("close_timeout_secs", self.close_timeout_secs)?,
        )
    }

    pub fn bootstrap_credential(&self) -> Option<Credential> {
        match (&self.bootstrap.username, &self.bootstrap.password) {
            (Some(user), Some(pass)) => Some(Credential::new(user.clone(), pass.clone())),
            _ => None,
        }
    }
}

fn non_zero_secs(name: &str, secs: u64) -> Result<Duration, DashboardError> {
    if secs == 0 {
        return Err(DashboardError::InvalidConfig(format!(
            "{name} must be positive"
        )));
    }
    Ok(Duration::from_secs(secs))
}
