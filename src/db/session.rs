//! Credential-scoped pool lifecycle for one dashboard session.
//!
//! A [`DbSession`] owns at most one live pool, bound to the identity that opened
//! it. `connected` is derived from the presence of that pool, so the two can
//! never disagree. Transitions (connect, disconnect, logout) hold the state write
//! lock for their whole duration: they are serialized, and readers never observe
//! a half-finished transition.

use crate::db::connector::{Connector, Driver, classify_connect_error};
use crate::db::models::{Credential, PoolLimits, PoolStatus, SessionSnapshot};
use crate::error::DashboardError;
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Non-fatal failure while tearing down a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseWarning {
    pub identity: String,
    pub reason: String,
}

impl std::fmt::Display for CloseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "closing pool for `{}`: {}", self.identity, self.reason)
    }
}

/// Identities offered at login, with a warning when they could not be listed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityListing {
    pub identities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

struct PoolHandle {
    pool: AnyPool,
    identity: String,
}

#[derive(Default)]
struct SessionState {
    pool: Option<PoolHandle>,
    identity: Option<String>,
}

pub struct DbSession {
    connector: Arc<dyn Connector>,
    limits: PoolLimits,
    state: RwLock<SessionState>,
}

impl DbSession {
    pub fn new(connector: Arc<dyn Connector>, limits: PoolLimits) -> Self {
        Self {
            connector,
            limits,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    pub fn driver(&self) -> Driver {
        self.connector.driver()
    }

    /// Open a pool as `credential`, replacing any live one. Uses the configured connect timeout.
    pub async fn connect(&self, credential: Credential) -> Result<String, DashboardError> {
        self.connect_within(credential, self.limits.connect_timeout())
            .await
    }

    /// Like [`connect`](Self::connect) with an explicit timeout. A pool that finishes
    /// opening after `timeout` is closed in the background.
    pub async fn connect_within(
        &self,
        credential: Credential,
        timeout: Duration,
    ) -> Result<String, DashboardError> {
        let mut state = self.state.write().await;
        self.teardown(&mut state).await;
        state.identity = None;

        let username = credential.username().to_string();
        info!(identity = %username, "opening connection pool");

        let connector = self.connector.clone();
        let limits = self.limits.with_connect_timeout(timeout);
        let mut opening: JoinHandle<Result<AnyPool, DashboardError>> =
            tokio::spawn(async move { connector.open_pool(&credential, &limits).await });

        match tokio::time::timeout(timeout, &mut opening).await {
            Ok(Ok(Ok(pool))) => {
                state.pool = Some(PoolHandle {
                    pool,
                    identity: username.clone(),
                });
                state.identity = Some(username.clone());
                info!(identity = %username, "connection pool ready");
                Ok(username)
            }
            Ok(Ok(Err(e))) => {
                warn!(identity = %username, error = %e, "failed to open connection pool");
                Err(e)
            }
            Ok(Err(e)) => {
                warn!(identity = %username, error = %e, "pool opening task failed");
                Err(DashboardError::Connectivity(format!(
                    "opening the connection pool failed: {e}"
                )))
            }
            Err(_) => {
                warn!(
                    identity = %username,
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out opening connection pool"
                );
                tokio::spawn(close_late_pool(opening, username.clone()));
                Err(DashboardError::Connectivity(format!(
                    "timed out after {}ms opening the connection pool",
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Close the live pool. The logged-in identity survives; only [`logout`](Self::logout) clears it.
    pub async fn disconnect(&self) -> Option<CloseWarning> {
        let mut state = self.state.write().await;
        self.teardown(&mut state).await
    }

    pub async fn logout(&self) -> Option<CloseWarning> {
        let mut state = self.state.write().await;
        let warning = self.teardown(&mut state).await;
        if let Some(identity) = state.identity.take() {
            info!(identity = %identity, "logged out");
        }
        warning
    }

    /// Lease one connection, waiting up to the configured acquire timeout.
    pub async fn acquire(&self) -> Result<ScopedConnection, DashboardError> {
        self.acquire_within(self.limits.acquire_timeout()).await
    }

    pub async fn acquire_within(
        &self,
        timeout: Duration,
    ) -> Result<ScopedConnection, DashboardError> {
        let (pool, identity) = {
            let state = self.state.read().await;
            let handle = state.pool.as_ref().ok_or(DashboardError::NotConnected)?;
            (handle.pool.clone(), handle.identity.clone())
        };

        let conn = match tokio::time::timeout(timeout, pool.acquire()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(sqlx::Error::PoolTimedOut)) | Err(_) => {
                warn!(identity = %identity, size = pool.size(), "connection pool exhausted");
                return Err(DashboardError::PoolExhausted);
            }
            Ok(Err(sqlx::Error::PoolClosed)) => return Err(DashboardError::NotConnected),
            Ok(Err(e)) => return Err(classify_connect_error(e)),
        };
        debug!(identity = %identity, "connection leased");
        Ok(ScopedConnection {
            conn,
            identity,
            driver: self.connector.driver(),
        })
    }

    /// Candidate login identities over the bootstrap credential. Never touches session state.
    pub async fn list_privileged_identities(&self) -> IdentityListing {
        let listed =
            tokio::time::timeout(self.limits.connect_timeout(), self.connector.list_identities())
                .await
                .unwrap_or_else(|_| {
                    Err(DashboardError::Connectivity(
                        "timed out listing database users".to_string(),
                    ))
                });
        match listed {
            Ok(identities) => IdentityListing {
                identities,
                warning: None,
            },
            Err(e) => {
                warn!(error = %e, "failed to list database users");
                IdentityListing {
                    identities: Vec::new(),
                    warning: Some(format!("Error fetching DB users: {e}")),
                }
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.pool.is_some()
    }

    pub async fn identity(&self) -> Option<String> {
        self.state.read().await.identity.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            connected: state.pool.is_some(),
            identity: state.identity.clone(),
            pool: state.pool.as_ref().map(|h| PoolStatus {
                size: h.pool.size(),
                idle: h.pool.num_idle(),
            }),
        }
    }

    /// Connected identity, or `NotConnected` when there is no pool or no identity.
    pub async fn require_identity(&self) -> Result<String, DashboardError> {
        let state = self.state.read().await;
        match (&state.pool, &state.identity) {
            (Some(_), Some(identity)) => Ok(identity.clone()),
            _ => Err(DashboardError::NotConnected),
        }
    }

    async fn teardown(&self, state: &mut SessionState) -> Option<CloseWarning> {
        let handle = state.pool.take()?;
        let identity = handle.identity;
        let timeout = self.limits.close_timeout();
        match tokio::time::timeout(timeout, handle.pool.close()).await {
            Ok(()) => {
                info!(identity = %identity, "connection pool closed");
                None
            }
            Err(_) => {
                let warning = CloseWarning {
                    identity,
                    reason: format!(
                        "connections still leased after {}ms; they close on release",
                        timeout.as_millis()
                    ),
                };
                warn!(warning = %warning, "pool teardown incomplete");
                Some(warning)
            }
        }
    }
}

/// Close a pool whose opening outlived the connect timeout, once it arrives.
async fn close_late_pool(
    opening: JoinHandle<Result<AnyPool, DashboardError>>,
    identity: String,
) {
    if let Ok(Ok(pool)) = opening.await {
        pool.close().await;
        info!(identity = %identity, "closed pool that finished opening after the timeout");
    }
}

/// A leased connection, returned to its pool when dropped.
pub struct ScopedConnection {
    conn: PoolConnection<Any>,
    identity: String,
    driver: Driver,
}

impl ScopedConnection {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }
}

impl Deref for ScopedConnection {
    type Target = AnyConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        debug!(identity = %self.identity, "connection released");
    }
}
