//! Redirects for the role gated frontend pages.
//!
//! Only page paths are gated here. The JSON API under `/v1` and the
//! integration endpoints under `/api` do their own checks and answer with
//! status codes instead of redirects.

use crate::server::session::resolve_session;
use crate::server::state::ServerState;
use crate::user::UserRole;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

/// Page prefix and the role it belongs to. `None` admits any signed in user.
const GATED_PAGES: &[(&str, Option<UserRole>)] = &[
    ("/dashboard", Some(UserRole::Customer)),
    ("/checkout", Some(UserRole::Customer)),
    ("/orders", None),
    ("/vendor", Some(UserRole::Vendor)),
    ("/rider", Some(UserRole::Rider)),
    ("/admin", Some(UserRole::Admin)),
];

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_gated(path: &str) -> bool {
    GATED_PAGES
        .iter()
        .any(|(prefix, _)| matches_prefix(path, prefix))
}

pub enum GuardDecision {
    Allow,
    Login { redirect: String },
    WrongRole { home: &'static str },
}

/// Decides what to do with a page request given the caller's role, if any.
pub fn decide(path: &str, role: Option<UserRole>) -> GuardDecision {
    let required = match GATED_PAGES
        .iter()
        .find(|(prefix, _)| matches_prefix(path, prefix))
    {
        Some((_, required)) => *required,
        None => return GuardDecision::Allow,
    };

    match (role, required) {
        (None, _) => GuardDecision::Login {
            redirect: path.to_string(),
        },
        (Some(_), None) | (Some(UserRole::Admin), _) => GuardDecision::Allow,
        (Some(role), Some(required)) if role == required => GuardDecision::Allow,
        (Some(role), Some(_)) => GuardDecision::WrongRole {
            home: role.dashboard_path(),
        },
    }
}

fn see_other(location: &str) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
}

pub async fn route_guard(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_gated(&path) {
        return next.run(request).await;
    }
    let role = match resolve_session(request.headers(), &state).await {
        Ok(session) => session.map(|s| s.role),
        Err(e) => return e.into_response(),
    };
    match decide(&path, role) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Login { redirect } => {
            debug!("No session for page {}, redirecting to login", redirect);
            see_other(&format!(
                "/login?redirect={}",
                urlencoding::encode(&redirect)
            ))
        }
        GuardDecision::WrongRole { home } => {
            debug!("Page {} not for this role, redirecting to {}", path, home);
            see_other(home)
        }
    }
}
