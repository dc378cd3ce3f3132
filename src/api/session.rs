//! Session middleware.
//!
//! Protected routes run [`require_session`], which resolves the session token
//! from the `session` cookie (or an `Authorization: Bearer` header), re-loads the
//! user and stores a [`CurrentUser`] in the request extensions. Admin routes
//! additionally run [`require_admin`].

use crate::{
    api::AppState,
    core::{
        auth::{SESSION_COOKIE, SessionClaims, verify_session},
        role::{ADMIN_ROLE, get_role},
        user::get_user,
    },
    entities::{role, user},
    errors::{Error, Result},
};
use axum::{
    Extension,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// The signed-in user of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: user::Model,
    pub role: role::Model,
    pub claims: SessionClaims,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.name == ADMIN_ROLE
    }
}

fn unauthorized(message: &str) -> Error {
    Error::Unauthorized {
        message: message.to_string(),
    }
}

/// Session token of a request: the `session` cookie first, then a Bearer token.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser> {
    let token = session_token(headers).ok_or_else(|| unauthorized("missing session"))?;
    let claims = verify_session(&token, &state.config.session_secret)?;

    let user = get_user(&state.db, claims.user_id()?)
        .await?
        .ok_or_else(|| unauthorized("user no longer exists"))?;
    if !user.is_active {
        return Err(unauthorized("user is inactive"));
    }
    // Role changes take effect without a new login
    let role = get_role(&state.db, user.role_id)
        .await?
        .ok_or_else(|| unauthorized("user has no role"))?;

    Ok(CurrentUser {
        user,
        role,
        claims,
    })
}

/// Rejects requests without a valid session with 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let current = resolve(&state, request.headers()).await?;
    debug!(user_id = current.user.id, role = %current.role.name, "Session resolved");
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

/// Rejects signed-in users without the admin role with 403.
pub async fn require_admin(
    Extension(current): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if !current.is_admin() {
        return Err(Error::Forbidden {
            message: "administrator role required".to_string(),
        });
    }
    Ok(next.run(request).await)
}
