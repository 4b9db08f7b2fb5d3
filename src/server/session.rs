use super::error::ApiError;
use super::state::ServerState;
use crate::user::auth::AuthTokenValue;
use crate::user::{Permission, UserRole};

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: usize,
    pub token: String,
    pub role: UserRole,
    pub permissions: Vec<Permission>,
}

impl Session {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            debug!(
                "User {} lacks permission {:?}",
                self.user_id, permission
            );
            Err(ApiError::Forbidden)
        }
    }
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

#[derive(Debug)]
pub enum SessionExtractionError {
    AccessDenied,
    InternalError,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
            SessionExtractionError::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn extract_session_token_from_cookies(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .map(|s| s.to_string())
}

/// Accepts both `Bearer <token>` and the bare token.
fn extract_session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(HEADER_SESSION_TOKEN_KEY)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolves the session token carried by a request, cookie first.
pub async fn resolve_session(
    headers: &HeaderMap,
    ctx: &ServerState,
) -> Result<Option<Session>, SessionExtractionError> {
    let token = match extract_session_token_from_cookies(headers)
        .or_else(|| extract_session_token_from_headers(headers))
    {
        None => {
            debug!("No token in cookies nor headers.");
            return Ok(None);
        }
        Some(x) => x,
    };

    let resolved = match ctx.user_manager.resolve_token(&AuthTokenValue(token)) {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            debug!("Auth token not found in database");
            return Ok(None);
        }
        Err(e) => {
            error!("Failed to resolve auth token: {:#}", e);
            return Err(SessionExtractionError::InternalError);
        }
    };

    let role = resolved.user.role;
    debug!(
        "Resolved session for user_id={} role={}",
        resolved.user.id,
        role.as_str()
    );
    Ok(Some(Session {
        user_id: resolved.user.id,
        token: resolved.token.value.0,
        role,
        permissions: role.permissions().to_vec(),
    }))
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(&parts.headers, ctx)
            .await?
            .ok_or(SessionExtractionError::AccessDenied)
    }
}

impl OptionalFromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        resolve_session(&parts.headers, ctx).await
    }
}
