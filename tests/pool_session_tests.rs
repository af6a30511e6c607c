mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FixtureConnector, alice, bob, harness, limits};
use futures::future::BoxFuture;
use medsupply_dashboard::DashboardError;
use medsupply_dashboard::config::DatabaseConfig;
use medsupply_dashboard::db::{Connector, Credential, DbSession, Driver, PoolLimits};
use sqlx::{Any, AnyPool};

#[tokio::test]
async fn wrong_password_is_an_auth_error_and_leaves_session_disconnected() {
    let h = harness("auth", limits(2)).await;

    let err = h
        .session
        .connect(Credential::new("alice", "wrong"))
        .await
        .expect_err("wrong password must be rejected");
    assert!(matches!(err, DashboardError::Authentication(_)));

    let snap = h.session.snapshot().await;
    assert!(!snap.connected);
    assert!(snap.identity.is_none());
    assert!(snap.pool.is_none());
    assert!(h.connector.opened().is_empty());
}

#[tokio::test]
async fn failed_reconnect_drops_the_previous_login() {
    let h = harness("failed-reconnect", limits(2)).await;
    h.session.connect(alice()).await.expect("alice logs in");

    let err = h
        .session
        .connect(Credential::new("bob", "nope"))
        .await
        .expect_err("bob's password is wrong");
    assert!(matches!(err, DashboardError::Authentication(_)));

    assert!(!h.session.is_connected().await);
    assert!(h.session.identity().await.is_none());
    assert!(h.connector.live_identities().is_empty());
}

#[tokio::test]
async fn unreachable_database_is_a_connectivity_error() {
    let cfg = DatabaseConfig {
        driver: Driver::Sqlite,
        service_name: "/nonexistent-medsupply-dir/missing.sqlite".to_string(),
        ..DatabaseConfig::default()
    };
    let session = DbSession::new(Arc::new(FixtureConnector::new(&cfg)), limits(2));

    let err = session.connect(alice()).await.expect_err("file does not exist");
    assert!(matches!(err, DashboardError::Connectivity(_)), "got {err:?}");
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn connected_session_runs_statements_and_stays_connected() {
    let h = harness("read", limits(2)).await;
    let identity = h.session.connect(alice()).await.expect("alice logs in");
    assert_eq!(identity, "alice");

    {
        let mut conn = h.session.acquire().await.expect("lease a connection");
        assert_eq!(conn.identity(), "alice");
        let serials = sqlx::query_scalar::<Any, String>("SELECT serial_no FROM product ORDER BY serial_no")
            .fetch_all(&mut *conn)
            .await
            .expect("read products");
        assert_eq!(serials, vec!["SN-1", "SN-2", "SN-3"]);
    }

    let snap = h.session.snapshot().await;
    assert!(snap.connected);
    assert_eq!(snap.identity.as_deref(), Some("alice"));
    assert!(snap.pool.is_some());
}

#[tokio::test]
async fn second_login_closes_the_first_pool() {
    let h = harness("relogin", limits(2)).await;
    h.session.connect(alice()).await.expect("alice logs in");
    h.session.connect(bob()).await.expect("bob logs in");

    let opened = h.connector.opened();
    assert_eq!(opened.len(), 2);
    assert!(opened[0].1.is_closed(), "alice's pool must be closed");
    assert!(!opened[1].1.is_closed());
    assert_eq!(h.connector.live_identities(), vec!["bob".to_string()]);
    assert_eq!(h.session.identity().await.as_deref(), Some("bob"));
}

#[tokio::test]
async fn concurrent_logins_leave_exactly_one_live_pool() {
    let h = harness("race", limits(2)).await;

    let (a, b) = tokio::join!(h.session.connect(alice()), h.session.connect(bob()));
    a.expect("alice logs in");
    b.expect("bob logs in");

    let live = h.connector.live_identities();
    assert_eq!(live.len(), 1);
    assert_eq!(h.session.identity().await, live.first().cloned());
    assert!(h.session.is_connected().await);
}

#[tokio::test]
async fn acquire_without_login_is_not_connected() {
    let h = harness("not-connected", limits(2)).await;
    let err = h.session.acquire().await.err().expect("no pool yet");
    assert!(matches!(err, DashboardError::NotConnected));

    h.session.connect(alice()).await.expect("alice logs in");
    h.session.disconnect().await;
    let err = h.session.acquire().await.err().expect("pool was closed");
    assert!(matches!(err, DashboardError::NotConnected));
}

#[tokio::test]
async fn exhausted_pool_times_out_with_pool_exhausted() {
    let h = harness("exhausted", limits(1)).await;
    h.session.connect(alice()).await.expect("alice logs in");

    let _held = h.session.acquire().await.expect("first lease");
    let err = h
        .session
        .acquire_within(Duration::from_millis(200))
        .await
        .err()
        .expect("second lease cannot be served");
    assert!(matches!(err, DashboardError::PoolExhausted));
}

#[tokio::test]
async fn leases_return_to_the_pool_after_statement_errors() {
    let h = harness("release", limits(1)).await;
    h.session.connect(alice()).await.expect("alice logs in");

    for _ in 0..5 {
        let mut conn = h
            .session
            .acquire_within(Duration::from_secs(2))
            .await
            .expect("the single connection is free again");
        let err = sqlx::query::<Any>("SELECT * FROM no_such_table")
            .execute(&mut *conn)
            .await
            .map_err(DashboardError::from)
            .expect_err("table does not exist");
        assert!(matches!(err, DashboardError::Statement(_)));
    }

    let snap = h.session.snapshot().await;
    assert!(snap.pool.is_some_and(|p| p.size <= 1));
}

#[tokio::test]
async fn disconnect_keeps_identity_but_logout_clears_it() {
    let h = harness("logout", limits(2)).await;
    h.session.connect(alice()).await.expect("alice logs in");

    assert!(h.session.disconnect().await.is_none());
    assert!(!h.session.is_connected().await);
    assert_eq!(h.session.identity().await.as_deref(), Some("alice"));
    assert!(matches!(
        h.session.require_identity().await,
        Err(DashboardError::NotConnected)
    ));

    assert!(h.session.disconnect().await.is_none(), "second disconnect is a no-op");

    h.session.logout().await;
    let snap = h.session.snapshot().await;
    assert!(!snap.connected);
    assert!(snap.identity.is_none());
}

#[tokio::test]
async fn logout_with_leased_connection_warns_and_still_clears_state() {
    let h = harness(
        "close-warning",
        limits(1).with_close_timeout(Duration::from_millis(200)),
    )
    .await;
    h.session.connect(alice()).await.expect("alice logs in");
    let held = h.session.acquire().await.expect("lease");

    let warning = h.session.logout().await.expect("close cannot finish while leased");
    assert_eq!(warning.identity, "alice");

    let snap = h.session.snapshot().await;
    assert!(!snap.connected);
    assert!(snap.identity.is_none());
    assert!(h.connector.live_identities().is_empty());
    drop(held);
}

#[tokio::test]
async fn identities_are_listed_without_touching_the_session() {
    let h = harness("identities", limits(2)).await;
    let listing = h.session.list_privileged_identities().await;
    assert_eq!(listing.identities, vec!["alice", "bob"]);
    assert!(listing.warning.is_none());
    assert!(!h.session.is_connected().await);
}

#[tokio::test]
async fn identity_listing_failure_is_a_warning() {
    let db = common::TestDb::seeded("identities-fail").await;
    let mut cfg = db.config();
    cfg.bootstrap.identity_query = "SELECT username FROM missing_users".to_string();
    let session = DbSession::new(Arc::new(FixtureConnector::new(&cfg)), limits(2));
    session.connect(alice()).await.expect("alice logs in");

    let listing = session.list_privileged_identities().await;
    assert!(listing.identities.is_empty());
    let warning = listing.warning.expect("failure is reported");
    assert!(warning.starts_with("Error fetching DB users:"));
    assert_eq!(session.identity().await.as_deref(), Some("alice"));
    assert!(session.is_connected().await);
}

struct SlowConnector {
    inner: FixtureConnector,
    delay: Duration,
}

impl Connector for SlowConnector {
    fn driver(&self) -> Driver {
        self.inner.driver()
    }

    fn open_pool<'a>(
        &'a self,
        credential: &'a Credential,
        limits: &'a PoolLimits,
    ) -> BoxFuture<'a, Result<AnyPool, DashboardError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.open_pool(credential, limits).await
        })
    }

    fn list_identities(&self) -> BoxFuture<'_, Result<Vec<String>, DashboardError>> {
        self.inner.list_identities()
    }
}

#[tokio::test]
async fn slow_login_times_out_as_connectivity_error() {
    let db = common::TestDb::seeded("slow").await;
    let connector = SlowConnector {
        inner: FixtureConnector::new(&db.config()),
        delay: Duration::from_secs(5),
    };
    let session = DbSession::new(Arc::new(connector), limits(2));

    let err = session
        .connect_within(alice(), Duration::from_millis(50))
        .await
        .expect_err("login is slower than the timeout");
    assert!(matches!(err, DashboardError::Connectivity(_)));
    assert!(!session.is_connected().await);
    assert!(session.identity().await.is_none());
}

#[tokio::test]
async fn acquire_within_outlasts_the_configured_acquire_timeout() {
    let h = harness(
        "acquire-longer",
        limits(1).with_acquire_timeout(Duration::from_millis(300)),
    )
    .await;
    h.session.connect(alice()).await.expect("alice logs in");

    let held = h.session.acquire().await.expect("first lease");
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        drop(held);
    });

    let conn = h
        .session
        .acquire_within(Duration::from_secs(3))
        .await
        .expect("the lease comes back before the caller's timeout");
    assert_eq!(conn.identity(), "alice");
    release.await.expect("release task");
}

#[tokio::test]
async fn connect_within_outlasts_the_configured_connect_timeout() {
    let db = common::TestDb::seeded("connect-longer").await;
    let connector = SlowConnector {
        inner: FixtureConnector::new(&db.config()),
        delay: Duration::from_millis(500),
    };
    let session = DbSession::new(
        Arc::new(connector),
        limits(2).with_connect_timeout(Duration::from_millis(200)),
    );

    let identity = session
        .connect_within(alice(), Duration::from_secs(3))
        .await
        .expect("login finishes within the caller's timeout");
    assert_eq!(identity, "alice");
    assert!(session.is_connected().await);
}

/// Opens the pool, then holds on to it before answering.
struct StallingConnector {
    inner: FixtureConnector,
    stall: Duration,
}

impl Connector for StallingConnector {
    fn driver(&self) -> Driver {
        self.inner.driver()
    }

    fn open_pool<'a>(
        &'a self,
        credential: &'a Credential,
        limits: &'a PoolLimits,
    ) -> BoxFuture<'a, Result<AnyPool, DashboardError>> {
        Box::pin(async move {
            let pool = self.inner.open_pool(credential, limits).await?;
            tokio::time::sleep(self.stall).await;
            Ok(pool)
        })
    }

    fn list_identities(&self) -> BoxFuture<'_, Result<Vec<String>, DashboardError>> {
        self.inner.list_identities()
    }
}

#[tokio::test]
async fn timed_out_login_closes_the_pool_it_opened() {
    let db = common::TestDb::seeded("stalled").await;
    let connector = Arc::new(StallingConnector {
        inner: FixtureConnector::new(&db.config()),
        stall: Duration::from_millis(400),
    });
    let session = DbSession::new(connector.clone(), limits(2));

    let err = session
        .connect_within(alice(), Duration::from_millis(150))
        .await
        .expect_err("the connector answers after the timeout");
    assert!(matches!(err, DashboardError::Connectivity(_)));
    assert!(!session.is_connected().await);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let opened = connector.inner.opened();
        if opened.len() == 1 && opened[0].1.is_closed() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "pool opened past the timeout was never closed"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(connector.inner.live_identities().is_empty());
}
