//! Role administration and menu grants.

use crate::{
    api::AppState,
    core::role::{self, RoleInput},
    entities::{menu, role as role_entity},
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MenuGrants {
    pub menu_ids: Vec<i64>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<role_entity::Model>>> {
    role::list_roles(&state.db).await.map(Json)
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<RoleInput>,
) -> Result<(StatusCode, Json<role_entity::Model>)> {
    let created = role::create_role(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<RoleInput>,
) -> Result<Json<role_entity::Model>> {
    role::update_role(&state.db, id, input).await.map(Json)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    role::delete_role(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn menus(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<menu::Model>>> {
    role::get_role_menus(&state.db, id).await.map(Json)
}

pub async fn assign_menus(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(grants): Json<MenuGrants>,
) -> Result<Json<Vec<menu::Model>>> {
    role::assign_menus(&state.db, id, &grants.menu_ids)
        .await
        .map(Json)
}
