use crate::config::MIN_COOKIE_SECRET_LEN;
use crate::db::DbSession;
use crate::error::DashboardError;
use crate::router::DashboardState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use base64::Engine;
use std::sync::Arc;
use time::Duration;
use tracing::warn;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "medsupply_session";

pub fn decode_cookie_secret(secret: &str) -> Result<Vec<u8>, DashboardError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(secret.trim())
        .map_err(|e| DashboardError::InvalidConfig(format!("cookie_secret is not base64: {e}")))?;
    if bytes.len() < MIN_COOKIE_SECRET_LEN {
        return Err(DashboardError::InvalidConfig(format!(
            "cookie_secret must decode to at least {MIN_COOKIE_SECRET_LEN} bytes"
        )));
    }
    Ok(bytes)
}

/// Key for the private session cookie. Without a secret a random key is used.
pub fn cookie_key(secret: Option<&str>) -> Result<Key, DashboardError> {
    match secret {
        Some(secret) => Ok(Key::from(&decode_cookie_secret(secret)?)),
        None => {
            warn!("no cookie_secret configured; sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}

/// Attach the caller's [`DbSession`] to the request, creating one when absent.
/// The cookie is re-issued on every response so its lifetime slides with activity.
pub async fn attach_session(
    State(state): State<DashboardState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
        .and_then(|id| state.sessions.get(&id).map(|session| (id, session)));
    let (id, session) = match existing {
        Some(found) => found,
        None => state.sessions.create(),
    };

    req.extensions_mut().insert(session);
    let resp = next.run(req).await;
    let max_age = Duration::seconds(state.sessions.idle_ttl().as_secs() as i64);
    let jar = jar.add(session_cookie(id, state.secure_cookie, max_age));
    (jar, resp).into_response()
}

fn session_cookie(id: Uuid, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// The caller's session, as attached by [`attach_session`].
#[derive(Clone)]
pub struct CurrentSession(pub Arc<DbSession>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = DashboardError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<DbSession>>()
            .cloned()
            .map(Self)
            .ok_or(DashboardError::NotConnected)
    }
}
