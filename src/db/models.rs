use crate::error::DashboardError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Username/password pair for one login attempt. Never persisted.
#[derive(Clone, Deserialize)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated pool sizing and timeouts.
///
/// `increment` is carried for deployments that size growth explicitly; the sqlx
/// pool grows one connection per demand, so it is only validated and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    min: u32,
    max: u32,
    increment: u32,
    connect_timeout: Duration,
    acquire_timeout: Duration,
    close_timeout: Duration,
}

impl PoolLimits {
    pub fn new(
        min: u32,
        max: u32,
        increment: u32,
        connect_timeout: Duration,
        acquire_timeout: Duration,
        close_timeout: Duration,
    ) -> Result<Self, DashboardError> {
        if min < 1 {
            return Err(DashboardError::InvalidConfig(
                "pool_min must be at least 1".to_string(),
            ));
        }
        if max < min {
            return Err(DashboardError::InvalidConfig(format!(
                "pool_max ({max}) must be >= pool_min ({min})"
            )));
        }
        if increment < 1 {
            return Err(DashboardError::InvalidConfig(
                "pool_increment must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            min,
            max,
            increment,
            connect_timeout,
            acquire_timeout,
            close_timeout,
        })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn increment(&self) -> u32 {
        self.increment
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Point-in-time view of the live pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: usize,
}

/// Observable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub connected: bool,
    pub identity: Option<String>,
    pub pool: Option<PoolStatus>,
}
