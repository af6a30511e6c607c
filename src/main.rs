use std::sync::Arc;
use std::time::Duration;

use medsupply_dashboard::config::CONFIG;
use medsupply_dashboard::db::{Connector, SqlxConnector};
use medsupply_dashboard::middleware::session::cookie_key;
use medsupply_dashboard::router::{DashboardState, dashboard_router};
use medsupply_dashboard::service::session_registry::SessionRegistry;
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.basic.listen_addr,
        driver = ?cfg.database.driver,
        host = %cfg.database.host,
        port = cfg.database.port,
        service_name = %cfg.database.service_name,
        loglevel = %cfg.basic.loglevel,
    );
    if cfg.database.bootstrap_credential().is_none() {
        warn!("no bootstrap credential configured; the login form will not list users");
    }

    let limits = cfg.database.pool_limits()?;
    let connector: Arc<dyn Connector> = Arc::new(SqlxConnector::new(&cfg.database));
    let sessions = Arc::new(SessionRegistry::new(
        connector,
        limits,
        Duration::from_secs(cfg.basic.session_idle_secs),
    ));

    let sweep_every = (sessions.idle_ttl() / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
    let sweeper = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_every);
            loop {
                ticker.tick().await;
                sessions.sweep();
            }
        })
    };

    let key = cookie_key(cfg.basic.cookie_secret.as_deref())?;
    let state = DashboardState::new(sessions.clone(), key, cfg.basic.insecure_cookie);
    let app = dashboard_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    sessions.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
