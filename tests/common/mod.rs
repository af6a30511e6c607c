#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use medsupply_dashboard::DashboardError;
use medsupply_dashboard::config::DatabaseConfig;
use medsupply_dashboard::db::{
    Connector, Credential, DbSession, Driver, PoolLimits, SqlxConnector,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{AnyPool, Connection};

pub const SCHEMA: &str = r#"
CREATE TABLE app_user (username TEXT PRIMARY KEY);
CREATE TABLE product (serial_no TEXT PRIMARY KEY, product_category TEXT, expiry_date TEXT);
CREATE TABLE team_member (
    tax_code TEXT PRIMARY KEY, member_name TEXT, member_surname TEXT,
    birth_date TEXT, employment_date TEXT
);
CREATE TABLE chief_officer (tax_code TEXT PRIMARY KEY, start_date TEXT);
CREATE TABLE logistic_team (
    team_code INTEGER PRIMARY KEY, team_name TEXT NOT NULL,
    chief_tax_code TEXT, completed_deliveries INTEGER
);
CREATE TABLE logistic_team_member (team_code INTEGER, tax_code TEXT);
CREATE TABLE distribution_center (center_name TEXT PRIMARY KEY, team_code INTEGER);
CREATE TABLE distribution_center_product (center_name TEXT, serial_no TEXT);
CREATE TABLE product_batch (
    batch_id INTEGER PRIMARY KEY, serial_no TEXT NOT NULL, quantity INTEGER NOT NULL,
    arrival_date TEXT, center_name TEXT
);
CREATE TABLE department (department_id INTEGER PRIMARY KEY, email TEXT, fax TEXT);
CREATE TABLE department_phone (department_id INTEGER, phone_number TEXT);
CREATE TABLE department_supply_preference (department_id INTEGER, serial_no TEXT);
CREATE TABLE customer (customer_code TEXT PRIMARY KEY, city TEXT, street TEXT, zip_code TEXT);
CREATE TABLE customer_department (customer_code TEXT, department_id INTEGER);
CREATE TABLE batch_order (
    order_id INTEGER PRIMARY KEY, order_date TEXT, expected_delivery_date TEXT,
    delivery_status TEXT NOT NULL, customer_code TEXT, team_code INTEGER
);
CREATE TABLE batch_order_batch (order_id INTEGER, batch_id INTEGER);
CREATE TABLE complaint (
    ticket_id INTEGER PRIMARY KEY, complaint_type TEXT, start_date TEXT, end_date TEXT,
    customer_code TEXT, order_id INTEGER
);
"#;

pub const SEED: &str = r#"
INSERT INTO app_user VALUES ('alice'), ('bob');
INSERT INTO product VALUES
    ('SN-1', 'Antibiotic', '2020-01-01'),
    ('SN-2', 'Bandage', '2099-12-31'),
    ('SN-3', 'Syringe', '2099-06-30');
INSERT INTO team_member VALUES
    ('TX-A', 'Anna', 'Rossi', '1980-04-02', '2010-01-01'),
    ('TX-B', 'Bruno', 'Verdi', '1975-09-12', '2008-05-01'),
    ('TX-M', 'Marco', 'Neri', '1990-01-20', '2015-03-01');
INSERT INTO chief_officer VALUES ('TX-A', '2019-01-01'), ('TX-B', '2020-06-01');
INSERT INTO logistic_team VALUES (1, 'Falcons', 'TX-A', 3), (2, 'Herons', 'TX-B', 0);
INSERT INTO logistic_team_member VALUES (1, 'TX-M'), (2, 'TX-M');
INSERT INTO distribution_center VALUES ('North', 1), ('South', 2);
INSERT INTO distribution_center_product VALUES
    ('North', 'SN-1'), ('North', 'SN-2'), ('South', 'SN-2'), ('South', 'SN-3');
INSERT INTO product_batch VALUES
    (1, 'SN-1', 10, '2019-06-01', 'North'),
    (2, 'SN-2', 5, '2024-01-01', 'North'),
    (3, 'SN-3', 7, '2024-02-01', NULL);
INSERT INTO department VALUES (10, 'ward@hospital.example', '555-0100');
INSERT INTO department_phone VALUES (10, '555-0101'), (10, '555-0102');
INSERT INTO department_supply_preference VALUES (10, 'SN-2');
INSERT INTO customer VALUES ('C-1', 'Milano', 'Via Roma 1', '20100'), ('C-2', 'Torino', 'Via Po 2', '10100');
INSERT INTO customer_department VALUES ('C-1', 10);
INSERT INTO batch_order VALUES (1, '2024-03-01', '2024-03-03', 'Delivered', 'C-1', 1);
INSERT INTO batch_order_batch VALUES (1, 2);
INSERT INTO complaint VALUES (1, 'Late delivery', '2024-03-04', NULL, 'C-1', 1);
"#;

/// A seeded SQLite file removed on drop.
pub struct TestDb {
    pub path: PathBuf,
}

impl TestDb {
    pub async fn seeded(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "medsupply-{tag}-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .expect("failed to create sqlite file");
        sqlx::raw_sql(SCHEMA)
            .execute(&mut conn)
            .await
            .expect("failed to create schema");
        sqlx::raw_sql(SEED)
            .execute(&mut conn)
            .await
            .expect("failed to seed schema");
        conn.close().await.expect("failed to close setup connection");

        Self { path }
    }

    pub fn config(&self) -> DatabaseConfig {
        let mut cfg = DatabaseConfig {
            driver: Driver::Sqlite,
            service_name: self.path.display().to_string(),
            ..DatabaseConfig::default()
        };
        cfg.bootstrap.username = Some("dba".to_string());
        cfg.bootstrap.password = Some("dba-secret".to_string());
        cfg.bootstrap.identity_query = "SELECT username FROM app_user ORDER BY username".to_string();
        cfg
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Wraps the real connector with per-user passwords, since SQLite has no logins,
/// and keeps every pool it opens so tests can check which ones are still live.
pub struct FixtureConnector {
    inner: SqlxConnector,
    passwords: HashMap<String, String>,
    opened: Mutex<Vec<(String, AnyPool)>>,
}

impl FixtureConnector {
    pub fn new(cfg: &DatabaseConfig) -> Self {
        let passwords = [("alice", "correct"), ("bob", "builder")]
            .into_iter()
            .map(|(u, p)| (u.to_string(), p.to_string()))
            .collect();
        Self {
            inner: SqlxConnector::new(cfg),
            passwords,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<(String, AnyPool)> {
        self.opened.lock().expect("opened lock poisoned").clone()
    }

    /// Identities whose pools have not been closed.
    pub fn live_identities(&self) -> Vec<String> {
        self.opened()
            .into_iter()
            .filter(|(_, pool)| !pool.is_closed())
            .map(|(identity, _)| identity)
            .collect()
    }
}

impl Connector for FixtureConnector {
    fn driver(&self) -> Driver {
        self.inner.driver()
    }

    fn open_pool<'a>(
        &'a self,
        credential: &'a Credential,
        limits: &'a PoolLimits,
    ) -> BoxFuture<'a, Result<AnyPool, DashboardError>> {
        Box::pin(async move {
            let expected = self.passwords.get(credential.username());
            if expected.map(String::as_str) != Some(credential.password()) {
                return Err(DashboardError::Authentication(
                    "invalid username/password; logon denied".to_string(),
                ));
            }
            let pool = self.inner.open_pool(credential, limits).await?;
            self.opened
                .lock()
                .expect("opened lock poisoned")
                .push((credential.username().to_string(), pool.clone()));
            Ok(pool)
        })
    }

    fn list_identities(&self) -> BoxFuture<'_, Result<Vec<String>, DashboardError>> {
        self.inner.list_identities()
    }
}

pub fn limits(max: u32) -> PoolLimits {
    PoolLimits::new(
        1,
        max,
        1,
        Duration::from_secs(5),
        Duration::from_secs(2),
        Duration::from_secs(2),
    )
    .expect("valid pool limits")
}

pub fn alice() -> Credential {
    Credential::new("alice", "correct")
}

pub fn bob() -> Credential {
    Credential::new("bob", "builder")
}

pub struct Harness {
    pub db: TestDb,
    pub connector: Arc<FixtureConnector>,
    pub session: DbSession,
}

pub async fn harness(tag: &str, limits: PoolLimits) -> Harness {
    let db = TestDb::seeded(tag).await;
    let connector = Arc::new(FixtureConnector::new(&db.config()));
    let session = DbSession::new(connector.clone(), limits);
    Harness {
        db,
        connector,
        session,
    }
}
