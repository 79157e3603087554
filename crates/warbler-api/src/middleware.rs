use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{error, warn};
use uuid::Uuid;

use warbler_db::SessionRepo;
use warbler_types::api::Claims;

use crate::auth::{AppState, SESSION_COOKIE, with_db};
use crate::policy::Identity;

/// The session a request arrived with. Anonymous requests carry the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentSession {
    pub identity: Identity,
    pub session_id: Option<Uuid>,
}

/// Resolve the caller's identity from `Authorization: Bearer` or the
/// session cookie. Never rejects: a missing, malformed, expired or ended
/// session just makes the request anonymous. Inserts both `Identity` and
/// `CurrentSession` into the request extensions.
pub async fn resolve_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let session = match session_token(req.headers()) {
        Some(token) => lookup_session(&state, &token).await,
        None => CurrentSession::default(),
    };

    req.extensions_mut().insert(session.identity);
    req.extensions_mut().insert(session);
    next.run(req).await
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match bearer {
        Some(token) => Some(token.to_string()),
        None => CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string()),
    }
}

async fn lookup_session(state: &AppState, token: &str) -> CurrentSession {
    let claims = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            warn!("Rejected session token: {}", e);
            return CurrentSession::default();
        }
    };

    let sid = claims.sid;
    let active = with_db(state, move |db| Ok(db.active_session(&sid.to_string(), Utc::now())?)).await;

    match active {
        Ok(Some(row)) if row.user_id == claims.sub => CurrentSession {
            identity: Identity::Authenticated(claims.sub),
            session_id: Some(sid),
        },
        Ok(_) => {
            warn!("Session {} is no longer active", sid);
            CurrentSession::default()
        }
        Err(e) => {
            error!("Session lookup failed: {}", e);
            CurrentSession::default()
        }
    }
}
