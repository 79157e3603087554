use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use warbler_db::models::SessionRow;
use warbler_db::{Database, SessionRepo};
use warbler_types::api::{AuthResponse, Claims, LoginRequest, SignupRequest};
use warbler_types::models::User;

use crate::accounts;
use crate::error::ApiError;
use crate::middleware::CurrentSession;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
}

/// Run blocking database work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
}

/// POST /signup: create the account and log it in.
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let secret = state.jwt_secret.clone();
    let ttl = state.session_ttl;
    let (user, token) = with_db(&state, move |db| {
        accounts::signup_then(db, &req, |db, user| open_session(db, &secret, ttl, user))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(token.clone())),
        Json(AuthResponse { user, token }),
    ))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let secret = state.jwt_secret.clone();
    let ttl = state.session_ttl;
    let (user, token) = with_db(&state, move |db| {
        let user = accounts::authenticate(db, &req.username, &req.password)?
            .ok_or(ApiError::InvalidCredentials)?;
        let token = open_session(db, &secret, ttl, &user)?;
        Ok((user, token))
    })
    .await?;

    info!("User {} logged in", user.id);

    Ok((
        jar.add(session_cookie(token.clone())),
        Json(AuthResponse { user, token }),
    ))
}

/// POST /logout: end the current session. The token stops resolving at once.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = session.identity.require()?;
    let sid = session.session_id.ok_or(ApiError::Unauthorized)?;

    with_db(&state, move |db| Ok(db.delete_session(&sid.to_string())?)).await?;
    info!("User {} logged out", user_id);

    Ok((StatusCode::NO_CONTENT, clear_session_cookie(jar)))
}

/// Persist a new session for `user` and sign a token naming it.
pub fn open_session<R: SessionRepo>(
    repo: &R,
    secret: &str,
    ttl: chrono::Duration,
    user: &User,
) -> Result<String, ApiError> {
    let sid = Uuid::new_v4();
    let now = Utc::now();
    let session = SessionRow {
        id: sid.to_string(),
        user_id: user.id,
        created_at: now,
        expires_at: now + ttl,
    };

    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        sid,
        exp: session.expires_at.timestamp() as usize,
    };
    let token = create_token(secret, &claims)?;

    repo.insert_session(&session)?;
    Ok(token)
}

pub(crate) fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn create_token(secret: &str, claims: &Claims) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}
