//! Role business logic - roles and the menus granted to them.
//!
//! Menu grants are replaced wholesale: the existing `role_menus` rows are deleted
//! and the new set is inserted inside one database transaction.

use crate::{
    entities::{Menu, Role, RoleMenu, User, menu, role, role_menu, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Name of the role allowed to manage users, roles and menus.
pub const ADMIN_ROLE: &str = "admin";

/// Fields accepted when creating or updating a role.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn validate_role_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Role name cannot be empty"));
    }
    Ok(name.to_string())
}

async fn ensure_name_free<C: ConnectionTrait>(
    db: &C,
    name: &str,
    except_role: Option<i64>,
) -> Result<()> {
    let mut query = Role::find().filter(role::Column::Name.eq(name));
    if let Some(id) = except_role {
        query = query.filter(role::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::validation(format!("Role '{name}' already exists")));
    }
    Ok(())
}

/// Retrieves all roles ordered by name.
pub async fn list_roles(db: &DatabaseConnection) -> Result<Vec<role::Model>> {
    Role::find()
        .order_by_asc(role::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a role by id.
pub async fn get_role(db: &DatabaseConnection, role_id: i64) -> Result<Option<role::Model>> {
    Role::find_by_id(role_id).one(db).await.map_err(Into::into)
}

/// Finds a role by its unique name.
pub async fn get_role_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<role::Model>> {
    Role::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a role with a unique, non-empty name.
#[instrument(skip(db, input), fields(name = %input.name))]
pub async fn create_role(db: &DatabaseConnection, input: RoleInput) -> Result<role::Model> {
    let name = validate_role_name(&input.name)?;
    ensure_name_free(db, &name, None).await?;

    let now = Utc::now();
    let role = role::ActiveModel {
        name: Set(name),
        description: Set(input.description),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let role = role.insert(db).await?;
    info!(role_id = role.id, "Created role");
    Ok(role)
}

/// Renames a role or changes its description.
#[instrument(skip(db, input))]
pub async fn update_role(
    db: &DatabaseConnection,
    role_id: i64,
    input: RoleInput,
) -> Result<role::Model> {
    let name = validate_role_name(&input.name)?;
    let mut role: role::ActiveModel = Role::find_by_id(role_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Role", role_id))?
        .into();
    ensure_name_free(db, &name, Some(role_id)).await?;

    role.name = Set(name);
    role.description = Set(input.description);
    role.updated_at = Set(Utc::now());
    role.update(db).await.map_err(Into::into)
}

/// Deletes a role and its menu grants.
///
/// # Errors
/// Returns `Error::Validation` while any user is still assigned to the role.
#[instrument(skip(db))]
pub async fn delete_role(db: &DatabaseConnection, role_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    Role::find_by_id(role_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Role", role_id))?;

    let assigned = User::find()
        .filter(user::Column::RoleId.eq(role_id))
        .count(&txn)
        .await?;
    if assigned > 0 {
        return Err(Error::validation(format!(
            "Role is still assigned to {assigned} user(s)"
        )));
    }

    RoleMenu::delete_many()
        .filter(role_menu::Column::RoleId.eq(role_id))
        .exec(&txn)
        .await?;
    Role::delete_by_id(role_id).exec(&txn).await?;

    txn.commit().await?;
    info!(role_id, "Deleted role");
    Ok(())
}

/// Menus granted to a role, ordered by `sort_order`.
pub async fn get_role_menus(db: &DatabaseConnection, role_id: i64) -> Result<Vec<menu::Model>> {
    Role::find_by_id(role_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Role", role_id))?;

    let menu_ids: Vec<i64> = RoleMenu::find()
        .filter(role_menu::Column::RoleId.eq(role_id))
        .all(db)
        .await?
        .into_iter()
        .map(|grant| grant.menu_id)
        .collect();

    if menu_ids.is_empty() {
        return Ok(Vec::new());
    }

    Menu::find()
        .filter(menu::Column::Id.is_in(menu_ids))
        .order_by_asc(menu::Column::SortOrder)
        .order_by_asc(menu::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Replaces the menus granted to a role.
///
/// Duplicate ids are collapsed. An empty list removes every grant. If the role or
/// any menu does not exist nothing is changed.
#[instrument(skip(db))]
pub async fn assign_menus(
    db: &DatabaseConnection,
    role_id: i64,
    menu_ids: &[i64],
) -> Result<Vec<menu::Model>> {
    let unique_ids: BTreeSet<i64> = menu_ids.iter().copied().collect();
    let txn = db.begin().await?;

    Role::find_by_id(role_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Role", role_id))?;

    if !unique_ids.is_empty() {
        let found: BTreeSet<i64> = Menu::find()
            .filter(menu::Column::Id.is_in(unique_ids.iter().copied()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        if let Some(missing) = unique_ids.difference(&found).next() {
            return Err(Error::validation(format!("Menu {missing} does not exist")));
        }
    }

    RoleMenu::delete_many()
        .filter(role_menu::Column::RoleId.eq(role_id))
        .exec(&txn)
        .await?;

    if !unique_ids.is_empty() {
        let grants = unique_ids.iter().map(|&menu_id| role_menu::ActiveModel {
            role_id: Set(role_id),
            menu_id: Set(menu_id),
            ..Default::default()
        });
        RoleMenu::insert_many(grants).exec(&txn).await?;
    }

    txn.commit().await?;
    info!(role_id, count = unique_ids.len(), "Assigned menus to role");

    get_role_menus(db, role_id).await
}
