//! User administration.

use crate::{
    api::{AppState, session::CurrentUser},
    core::user::{self, NewUser, UserUpdate, UserView},
    entities::Role,
    errors::{Error, Result},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use sea_orm::EntityTrait;

async fn view(state: &AppState, user: crate::entities::user::Model) -> Result<UserView> {
    let role = Role::find_by_id(user.role_id).one(&*state.db).await?;
    Ok(UserView::new(user, role.as_ref()))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<UserView>>> {
    user::list_users(&state.db).await.map(Json)
}

pub async fn create(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Result<(StatusCode, Json<UserView>)> {
    let created = user::create_user(&state.db, new_user).await?;
    Ok((StatusCode::CREATED, Json(view(&state, created).await?)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<UserView>> {
    user::get_user_view(&state.db, id).await.map(Json)
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserView>> {
    let updated = user::update_user(&state.db, id, update).await?;
    Ok(Json(view(&state, updated).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if id == current.user.id {
        return Err(Error::validation("You cannot delete your own account"));
    }
    user::delete_user(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
