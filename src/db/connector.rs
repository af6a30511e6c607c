//! Opening pools and one-off connections against the configured database.

use crate::config::DatabaseConfig;
use crate::db::models::{Credential, PoolLimits};
use crate::error::DashboardError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyConnection, AnyPool, ConnectOptions, Connection};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// SQLSTATE codes the server uses for rejected logins.
const AUTH_SQLSTATES: &[&str] = &["28000", "28P01"];

/// Upper bound sqlx applies to a lease. Callers bound their own waits with
/// `tokio::time::timeout`, so this only has to outlast them.
const POOL_ACQUIRE_CEILING: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Postgres,
    Sqlite,
}

impl Driver {
    /// Placeholder for a `YYYY-MM-DD` string bound at position `index`.
    pub fn date_param(self, index: usize) -> String {
        match self {
            Driver::Postgres => format!("CAST(${index} AS DATE)"),
            Driver::Sqlite => format!("${index}"),
        }
    }

    /// Comma-joined aggregate of `expr` within a group.
    pub fn string_agg(self, expr: &str) -> String {
        match self {
            Driver::Postgres => format!("string_agg({expr}, ', ')"),
            Driver::Sqlite => format!("group_concat({expr}, ', ')"),
        }
    }
}

/// Seam between the session manager and the database driver.
pub trait Connector: Send + Sync + 'static {
    fn driver(&self) -> Driver;

    /// Open a pool authenticated as `credential`, verified by one live connection
    /// obtained within `limits.connect_timeout()`. A pool that fails verification is closed.
    fn open_pool<'a>(
        &'a self,
        credential: &'a Credential,
        limits: &'a PoolLimits,
    ) -> BoxFuture<'a, Result<AnyPool, DashboardError>>;

    /// Enumerate login identities over a short-lived privileged connection.
    fn list_identities(&self) -> BoxFuture<'_, Result<Vec<String>, DashboardError>>;
}

/// sqlx-backed connector built from `[database]` configuration.
pub struct SqlxConnector {
    driver: Driver,
    host: String,
    port: u16,
    service_name: String,
    bootstrap: Option<Credential>,
    identity_query: String,
}

impl SqlxConnector {
    pub fn new(cfg: &DatabaseConfig) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            driver: cfg.driver,
            host: cfg.host.clone(),
            port: cfg.port,
            service_name: cfg.service_name.clone(),
            bootstrap: cfg.bootstrap_credential(),
            identity_query: cfg.bootstrap.identity_query.clone(),
        }
    }

    /// Connection URL for `credential`. SQLite has no logins, so the credential is unused there.
    pub fn connect_url(&self, credential: &Credential) -> Result<Url, DashboardError> {
        match self.driver {
            Driver::Postgres => {
                let mut url = Url::parse(&format!(
                    "postgres://{}:{}/{}",
                    self.host, self.port, self.service_name
                ))
                .map_err(|e| DashboardError::InvalidConfig(format!("database url: {e}")))?;
                url.set_username(credential.username())
                    .and_then(|_| url.set_password(Some(credential.password())))
                    .map_err(|_| {
                        DashboardError::InvalidConfig("database url cannot carry a login".into())
                    })?;
                Ok(url)
            }
            Driver::Sqlite => Url::parse(&format!("sqlite:{}", self.service_name))
                .map_err(|e| DashboardError::InvalidConfig(format!("database url: {e}"))),
        }
    }

    fn connect_options(&self, credential: &Credential) -> Result<AnyConnectOptions, DashboardError> {
        let url = self.connect_url(credential)?;
        AnyConnectOptions::from_url(&url).map_err(classify_connect_error)
    }
}

impl Connector for SqlxConnector {
    fn driver(&self) -> Driver {
        self.driver
    }

    fn open_pool<'a>(
        &'a self,
        credential: &'a Credential,
        limits: &'a PoolLimits,
    ) -> BoxFuture<'a, Result<AnyPool, DashboardError>> {
        Box::pin(async move {
            let options = self.connect_options(credential)?;
            debug!(
                identity = %credential.username(),
                min = limits.min(),
                max = limits.max(),
                increment = limits.increment(),
                "opening pool"
            );
            let pool = AnyPoolOptions::new()
                .min_connections(limits.min())
                .max_connections(limits.max())
                .acquire_timeout(POOL_ACQUIRE_CEILING)
                .connect_lazy_with(options);

            match tokio::time::timeout(limits.connect_timeout(), pool.acquire()).await {
                Ok(Ok(_first)) => Ok(pool),
                Ok(Err(e)) => {
                    pool.close().await;
                    Err(classify_connect_error(e))
                }
                Err(_) => {
                    pool.close().await;
                    Err(DashboardError::Connectivity(format!(
                        "timed out after {}ms waiting for the first connection",
                        limits.connect_timeout().as_millis()
                    )))
                }
            }
        })
    }

    fn list_identities(&self) -> BoxFuture<'_, Result<Vec<String>, DashboardError>> {
        Box::pin(async move {
            let Some(bootstrap) = self.bootstrap.as_ref() else {
                return Err(DashboardError::InvalidConfig(
                    "no bootstrap credential configured".to_string(),
                ));
            };
            let options = self.connect_options(bootstrap)?;
            let mut conn = AnyConnection::connect_with(&options)
                .await
                .map_err(classify_connect_error)?;
            let listed = sqlx::query_scalar::<_, String>(&self.identity_query)
                .fetch_all(&mut conn)
                .await;
            if let Err(e) = conn.close().await {
                warn!(error = %e, "failed to close bootstrap connection");
            }
            Ok(listed?)
        })
    }
}

/// Map a driver failure raised while logging in to the connect taxonomy.
pub fn classify_connect_error(err: sqlx::Error) -> DashboardError {
    match err {
        sqlx::Error::Database(db) => classify_server_rejection(db.code().as_deref(), db.message()),
        sqlx::Error::PoolTimedOut => {
            DashboardError::Connectivity("timed out waiting for the database".to_string())
        }
        sqlx::Error::Configuration(e) => {
            DashboardError::Connectivity(format!("database misconfigured: {e}"))
        }
        other => DashboardError::Connectivity(other.to_string()),
    }
}

fn classify_server_rejection(code: Option<&str>, message: &str) -> DashboardError {
    let auth_code = code.is_some_and(|c| AUTH_SQLSTATES.contains(&c));
    let lowered = message.to_ascii_lowercase();
    let auth_message = lowered.contains("password authentication failed")
        || lowered.contains("invalid username/password")
        || (lowered.contains("role") && lowered.contains("does not exist"));
    if auth_code || auth_message {
        DashboardError::Authentication(message.to_string())
    } else {
        DashboardError::Connectivity(message.to_string())
    }
}
