//! Database access: connection lifecycle and driver seam.
//!
//! Layout:
//! - `connector.rs`: opening pools/connections through sqlx, error classification
//! - `session.rs`: per-session pool lifecycle (connect, disconnect, logout, acquire)
//! - `models.rs`: credentials, pool limits and session snapshots

pub mod connector;
pub mod models;
pub mod session;

pub use connector::{Connector, Driver, SqlxConnector};
pub use models::{Credential, PoolLimits, PoolStatus, SessionSnapshot};
pub use session::{CloseWarning, DbSession, IdentityListing, ScopedConnection};
