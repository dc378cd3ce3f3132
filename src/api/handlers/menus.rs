//! Menu administration.

use crate::{
    api::AppState,
    core::menu::{self, MenuInput},
    entities::menu as menu_entity,
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<menu_entity::Model>>> {
    menu::list_menus(&state.db).await.map(Json)
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<MenuInput>,
) -> Result<(StatusCode, Json<menu_entity::Model>)> {
    let created = menu::create_menu(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<MenuInput>,
) -> Result<Json<menu_entity::Model>> {
    menu::update_menu(&state.db, id, input).await.map(Json)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    menu::delete_menu(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
