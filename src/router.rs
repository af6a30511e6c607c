use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;

use crate::handlers::{batches, deliveries, orders, session, tables};
use crate::middleware::session::attach_session;
use crate::service::session_registry::SessionRegistry;

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct DashboardState {
    pub sessions: Arc<SessionRegistry>,
    pub secure_cookie: bool,
    key: Key,
}

impl DashboardState {
    pub fn new(sessions: Arc<SessionRegistry>, key: Key, insecure_cookie: bool) -> Self {
        Self {
            sessions,
            secure_cookie: !insecure_cookie,
            key,
        }
    }
}

impl FromRef<DashboardState> for Key {
    fn from_ref(state: &DashboardState) -> Self {
        state.key.clone()
    }
}

pub fn dashboard_router(state: DashboardState) -> Router {
    let api = Router::new()
        .route("/session", get(session::session_status))
        .route("/identities", get(session::identities))
        .route("/login", post(session::login))
        .route("/disconnect", post(session::disconnect))
        .route("/logout", post(session::logout))
        .route("/sysdate", get(session::sysdate))
        .route("/tables", get(tables::list_tables))
        .route("/tables/{name}", get(tables::browse_table))
        .route("/batches/form", get(batches::batch_form))
        .route("/batches", post(batches::register_batch))
        .route("/batches/expired", get(batches::expired_batches))
        .route("/orders/form", get(orders::order_form))
        .route("/orders", post(orders::place_order))
        .route("/deliveries/pending", get(deliveries::pending_orders))
        .route("/deliveries/{order_id}/teams", get(deliveries::delivery_teams))
        .route("/deliveries", post(deliveries::assign_delivery))
        .route("/chiefs", get(deliveries::chiefs))
        .route("/chiefs/{tax_code}/deliveries", get(deliveries::team_deliveries))
        .route_layer(middleware::from_fn_with_state(state.clone(), attach_session))
        .layer(DefaultBodyLimit::max(BODY_LIMIT));

    Router::new()
        .route("/health", get(session::health))
        .nest("/api", api)
        .with_state(state)
}
