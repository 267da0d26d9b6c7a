//! Edge-level route guard.
//!
//! Every request passes through [`route_guard`] before it reaches a handler. The path is
//! classified against a static [`RouteTable`] and the decision is a pure function of the
//! path and the verified token claims: no store lookups, no mutation. A token that fails
//! verification is indistinguishable from no token at all.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{Claims, session_claims},
};

/// Access class of a URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    /// Login/registration pages; pointless once signed in.
    AuthOnly,
    /// Admin dashboard pages.
    AdminOnly,
}

/// Outcome of evaluating a request against the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// RouteTable
///
/// Static partition of paths into access classes, plus where rejected requests are sent.
/// Prefixes match whole path segments: `/admin` covers `/admin` and `/admin/users`, but
/// not `/administrator`.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub auth_only: Vec<String>,
    pub admin_only: Vec<String>,
    /// Target for signed-in users hitting an auth-only page.
    pub authenticated_redirect: String,
    /// Target for anyone without an admin token hitting an admin page.
    pub admin_fallback: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            auth_only: vec!["/login".to_string(), "/register".to_string()],
            admin_only: vec!["/admin".to_string()],
            authenticated_redirect: "/".to_string(),
            admin_fallback: "/".to_string(),
        }
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl RouteTable {
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.admin_only.iter().any(|p| matches_prefix(path, p)) {
            RouteClass::AdminOnly
        } else if self.auth_only.iter().any(|p| matches_prefix(path, p)) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    /// evaluate
    ///
    /// `claims` must already be verified; pass `None` for absent or invalid tokens.
    pub fn evaluate(&self, path: &str, claims: Option<&Claims>) -> GuardDecision {
        match self.classify(path) {
            RouteClass::AuthOnly if claims.is_some() => {
                GuardDecision::Redirect(self.authenticated_redirect.clone())
            }
            RouteClass::AdminOnly if !claims.is_some_and(|c| c.is_admin) => {
                GuardDecision::Redirect(self.admin_fallback.clone())
            }
            _ => GuardDecision::Allow,
        }
    }
}

/// route_guard
///
/// Middleware applying `RouteTable::evaluate` to every request. Denials are silent
/// temporary redirects with no body.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let claims = session_claims(request.headers(), &state.sessions);
    let path = request.uri().path().to_owned();

    match state.routes.evaluate(&path, claims.as_ref()) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(target) => {
            tracing::debug!(path = %path, target = %target, "route guard redirect");
            Redirect::temporary(&target).into_response()
        }
    }
}
