//! Signup, password login, sessions and the identity provider flow.

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::metrics;
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::state::{GuardedUserManager, ServerState};
use crate::user::auth::{AuthToken, AuthTokenValue};
use crate::user::{Permission, SignupRequest, UserRole};

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
    user_id: usize,
    role: UserRole,
    redirect: &'static str,
}

#[derive(Serialize)]
struct SessionResponse {
    user_id: usize,
    handle: String,
    display_name: String,
    role: UserRole,
    permissions: Vec<Permission>,
}

#[derive(Deserialize, Debug)]
struct OidcLoginQuery {
    role: Option<String>,
    redirect: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OidcCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn session_cookie(token: &AuthTokenValue) -> String {
    Cookie::build((COOKIE_SESSION_TOKEN_KEY, token.0.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
        .to_string()
}

fn expired_session_cookie() -> String {
    Cookie::build((COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .same_site(SameSite::Lax)
        .build()
        .to_string()
}

/// Only same-site absolute paths are accepted as post-login destinations.
fn safe_redirect(redirect: Option<&str>) -> Option<&str> {
    redirect.filter(|r| r.starts_with('/') && !r.starts_with("//"))
}

fn logged_in_response(token: &AuthToken, role: UserRole) -> Response {
    let body = LoginSuccessResponse {
        token: token.value.0.clone(),
        user_id: token.user_id,
        role,
        redirect: role.dashboard_path(),
    };
    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&token.value))],
        Json(body),
    )
        .into_response()
}

async fn signup(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    let user_id = user_manager.signup(&body)?;
    let token = user_manager.issue_token(user_id)?;
    Ok(logged_in_response(&token, body.role))
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<LoginBody>,
) -> Result<Response, ApiError> {
    debug!("login() called for {}", body.user_handle);
    let start = Instant::now();

    let token = match user_manager.login(&body.user_handle, &body.password)? {
        Some(token) => token,
        None => {
            metrics::record_login_attempt("failure", start.elapsed());
            return Ok(StatusCode::FORBIDDEN.into_response());
        }
    };
    let user = user_manager
        .get_user(token.user_id)?
        .ok_or(ApiError::Forbidden)?;

    metrics::record_login_attempt("success", start.elapsed());
    Ok(logged_in_response(&token, user.role))
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    match user_manager.revoke_token(&AuthTokenValue(session.token)) {
        Ok(_) => (
            StatusCode::OK,
            [(header::SET_COOKIE, expired_session_cookie())],
        )
            .into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

async fn get_session(
    State(user_manager): State<GuardedUserManager>,
    session: Session,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = user_manager
        .get_user(session.user_id)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(SessionResponse {
        user_id: user.id,
        handle: user.handle,
        display_name: user.display_name,
        role: session.role,
        permissions: session.permissions,
    }))
}

async fn oidc_login(
    State(state): State<ServerState>,
    Query(query): Query<OidcLoginQuery>,
) -> Result<Response, ApiError> {
    let oidc_client = state
        .oidc_client
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("OIDC login is not configured".to_string()))?;

    let role = match query.role.as_deref() {
        None => UserRole::Customer,
        Some(raw) => UserRole::from_str(raw)
            .filter(|r| r.is_self_service())
            .ok_or_else(|| ApiError::BadRequest(format!("Cannot sign up as {}", raw)))?,
    };
    let redirect = safe_redirect(query.redirect.as_deref()).map(str::to_string);

    let expired = state.auth_state_store.cleanup_expired().await;
    if expired > 0 {
        debug!("Dropped {} expired OIDC login states", expired);
    }

    let (url, auth_state) = oidc_client.authorize_url(role, redirect)?;
    state.auth_state_store.store(auth_state).await;
    Ok(Redirect::to(&url).into_response())
}

async fn oidc_callback(
    State(state): State<ServerState>,
    Query(query): Query<OidcCallbackQuery>,
) -> Result<Response, ApiError> {
    let oidc_client = state
        .oidc_client
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("OIDC login is not configured".to_string()))?;

    if let Some(error) = query.error {
        warn!("Identity provider returned error: {}", error);
        return Err(ApiError::BadRequest(format!("Login failed: {}", error)));
    }
    let (code, csrf) = match (query.code, query.state) {
        (Some(code), Some(csrf)) => (code, csrf),
        _ => return Err(ApiError::BadRequest("Missing code or state".to_string())),
    };
    let auth_state = state
        .auth_state_store
        .take(&csrf)
        .await
        .ok_or_else(|| ApiError::BadRequest("Unknown or expired login state".to_string()))?;

    let auth = match oidc_client.exchange_code(&code, &csrf, &auth_state).await {
        Ok(auth) => auth,
        Err(e) => {
            warn!("OIDC code exchange failed: {:#}", e);
            return Err(ApiError::Forbidden);
        }
    };

    let (token, created) = state.user_manager.login_or_provision_oidc(
        &auth.subject,
        &auth.handle_hint(),
        &auth.display_name(),
        auth_state.role,
    )?;
    let user = state
        .user_manager
        .get_user(token.user_id)?
        .ok_or(ApiError::Forbidden)?;
    info!(
        "OIDC login for user {} ({}){}",
        user.id,
        user.role.as_str(),
        if created { ", new account" } else { "" }
    );

    let location = safe_redirect(auth_state.redirect.as_deref())
        .unwrap_or(user.role.dashboard_path())
        .to_string();
    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, session_cookie(&token.value)),
            (header::LOCATION, location),
        ],
    )
        .into_response())
}

pub fn make_auth_routes(state: ServerState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/session", get(get_session))
        .route("/oidc/login", get(oidc_login))
        .route("/callback", get(oidc_callback))
        .with_state(state)
}
