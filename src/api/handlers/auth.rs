//! Login, logout, the current session and its navigation.

use crate::{
    api::{AppState, session::CurrentUser},
    config::server::AppEnv,
    core::{
        auth::{self, clear_session_cookie, session_cookie},
        menu::{MenuNode, navigation_for_role},
        user::UserView,
    },
    errors::Result,
};
use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserView,
    pub navigation: Vec<MenuNode>,
    /// Expiry of the session, seconds since the epoch
    pub expires_at: i64,
    /// Present only in the login response, for clients using Bearer tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    state.db.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let ttl = state.config.session_ttl_seconds();
    let outcome = auth::login(
        &state.db,
        &request.email,
        &request.password,
        &state.config.session_secret,
        ttl,
    )
    .await?;

    let navigation = navigation_for_role(&state.db, outcome.role.id).await?;
    let claims = auth::verify_session(&outcome.token, &state.config.session_secret)?;
    let cookie = session_cookie(
        &outcome.token,
        ttl,
        state.config.app_env == AppEnv::Production,
    );
    let body = SessionResponse {
        user: UserView::new(outcome.user, Some(&outcome.role)),
        navigation,
        expires_at: claims.exp,
        token: Some(outcome.token),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie())],
    )
}

pub async fn session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<SessionResponse>> {
    let navigation = navigation_for_role(&state.db, current.role.id).await?;
    Ok(Json(SessionResponse {
        expires_at: current.claims.exp,
        user: UserView::new(current.user, Some(&current.role)),
        navigation,
        token: None,
    }))
}

pub async fn navigation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<MenuNode>>> {
    navigation_for_role(&state.db, current.role.id).await.map(Json)
}
