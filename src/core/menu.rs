//! Menu business logic - sidebar entries and role-scoped navigation.
//!
//! The navigation of a signed-in user is the tree of menus granted to their role.
//! A granted child whose parent is not granted is promoted to the top level so
//! it stays reachable.

use crate::{
    core::role::get_role_menus,
    entities::{Menu, RoleMenu, menu, role_menu},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// Fields accepted when creating or updating a menu.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuInput {
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i32,
}

/// A menu with its visible children, as rendered in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    #[serde(flatten)]
    pub menu: menu::Model,
    pub children: Vec<MenuNode>,
}

/// Builds the navigation tree out of a flat list of menus.
///
/// Roots are the menus without a parent or whose parent is not in `menus`.
/// Siblings are ordered by `(sort_order, id)`.
#[must_use]
pub fn build_menu_tree(menus: Vec<menu::Model>) -> Vec<MenuNode> {
    let present: HashSet<i64> = menus.iter().map(|m| m.id).collect();
    let mut children_of: HashMap<Option<i64>, Vec<menu::Model>> = HashMap::new();
    for menu in menus {
        let parent = menu.parent_id.filter(|p| present.contains(p) && *p != menu.id);
        children_of.entry(parent).or_default().push(menu);
    }
    attach_children(None, &mut children_of)
}

fn attach_children(
    parent: Option<i64>,
    children_of: &mut HashMap<Option<i64>, Vec<menu::Model>>,
) -> Vec<MenuNode> {
    let mut level = children_of.remove(&parent).unwrap_or_default();
    level.sort_by_key(|m| (m.sort_order, m.id));
    level
        .into_iter()
        .map(|menu| {
            let children = attach_children(Some(menu.id), children_of);
            MenuNode { menu, children }
        })
        .collect()
}

fn validate_menu(input: &MenuInput) -> Result<(String, String)> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(Error::validation("Menu title cannot be empty"));
    }
    let path = input.path.trim();
    if !path.starts_with('/') {
        return Err(Error::validation(format!(
            "Menu path must start with '/': '{path}'"
        )));
    }
    Ok((title.to_string(), path.to_string()))
}

async fn ensure_path_free<C: ConnectionTrait>(
    db: &C,
    path: &str,
    except_menu: Option<i64>,
) -> Result<()> {
    let mut query = Menu::find().filter(menu::Column::Path.eq(path));
    if let Some(id) = except_menu {
        query = query.filter(menu::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::validation(format!("Menu path '{path}' already exists")));
    }
    Ok(())
}

async fn ensure_parent_exists<C: ConnectionTrait>(db: &C, parent_id: Option<i64>) -> Result<()> {
    if let Some(parent_id) = parent_id {
        if Menu::find_by_id(parent_id).one(db).await?.is_none() {
            return Err(Error::validation(format!(
                "Parent menu {parent_id} does not exist"
            )));
        }
    }
    Ok(())
}

/// Rejects a parent whose ancestor chain leads back to `menu_id`.
async fn ensure_not_descendant<C: ConnectionTrait>(
    db: &C,
    menu_id: i64,
    parent_id: Option<i64>,
) -> Result<()> {
    let mut seen = HashSet::new();
    let mut current = parent_id;
    while let Some(id) = current {
        if id == menu_id {
            return Err(Error::validation(
                "A menu cannot be nested under itself or one of its children",
            ));
        }
        if !seen.insert(id) {
            break;
        }
        current = Menu::find_by_id(id).one(db).await?.and_then(|m| m.parent_id);
    }
    Ok(())
}

/// Retrieves all menus ordered by `sort_order`, then id.
pub async fn list_menus(db: &DatabaseConnection) -> Result<Vec<menu::Model>> {
    Menu::find()
        .order_by_asc(menu::Column::SortOrder)
        .order_by_asc(menu::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a menu by its unique path.
pub async fn get_menu_by_path(db: &DatabaseConnection, path: &str) -> Result<Option<menu::Model>> {
    Menu::find()
        .filter(menu::Column::Path.eq(path))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a menu entry.
#[instrument(skip(db, input), fields(path = %input.path))]
pub async fn create_menu(db: &DatabaseConnection, input: MenuInput) -> Result<menu::Model> {
    let (title, path) = validate_menu(&input)?;
    ensure_path_free(db, &path, None).await?;
    ensure_parent_exists(db, input.parent_id).await?;

    let menu = menu::ActiveModel {
        title: Set(title),
        path: Set(path),
        icon: Set(input.icon),
        parent_id: Set(input.parent_id),
        sort_order: Set(input.sort_order),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let menu = menu.insert(db).await?;
    info!(menu_id = menu.id, "Created menu");
    Ok(menu)
}

/// Replaces every field of a menu entry.
#[instrument(skip(db, input))]
pub async fn update_menu(
    db: &DatabaseConnection,
    menu_id: i64,
    input: MenuInput,
) -> Result<menu::Model> {
    let (title, path) = validate_menu(&input)?;
    let mut menu: menu::ActiveModel = Menu::find_by_id(menu_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Menu", menu_id))?
        .into();
    ensure_path_free(db, &path, Some(menu_id)).await?;
    ensure_parent_exists(db, input.parent_id).await?;
    ensure_not_descendant(db, menu_id, input.parent_id).await?;

    menu.title = Set(title);
    menu.path = Set(path);
    menu.icon = Set(input.icon);
    menu.parent_id = Set(input.parent_id);
    menu.sort_order = Set(input.sort_order);
    menu.update(db).await.map_err(Into::into)
}

/// Deletes a menu, its role grants, and detaches its children.
#[instrument(skip(db))]
pub async fn delete_menu(db: &DatabaseConnection, menu_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    Menu::find_by_id(menu_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Menu", menu_id))?;

    RoleMenu::delete_many()
        .filter(role_menu::Column::MenuId.eq(menu_id))
        .exec(&txn)
        .await?;
    Menu::update_many()
        .col_expr(menu::Column::ParentId, Expr::value(Option::<i64>::None))
        .filter(menu::Column::ParentId.eq(menu_id))
        .exec(&txn)
        .await?;
    Menu::delete_by_id(menu_id).exec(&txn).await?;

    txn.commit().await?;
    info!(menu_id, "Deleted menu");
    Ok(())
}

/// Navigation tree of the menus granted to `role_id`.
pub async fn navigation_for_role(db: &DatabaseConnection, role_id: i64) -> Result<Vec<MenuNode>> {
    let menus = get_role_menus(db, role_id).await?;
    Ok(build_menu_tree(menus))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::role::assign_menus;
    use crate::test_utils::*;

    fn menu(id: i64, parent_id: Option<i64>, sort_order: i32) -> menu::Model {
        menu::Model {
            id,
            title: format!("Menu {id}"),
            path: format!("/menu-{id}"),
            icon: None,
            parent_id,
            sort_order,
            created_at: Utc::now(),
        }
    }

    fn ids(nodes: &[MenuNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.menu.id).collect()
    }

    #[test]
    fn test_build_menu_tree_nests_and_sorts() {
        let tree = build_menu_tree(vec![
            menu(1, None, 2),
            menu(2, None, 1),
            menu(3, Some(1), 5),
            menu(4, Some(1), 1),
            menu(5, Some(4), 0),
        ]);
        assert_eq!(ids(&tree), vec![2, 1]);
        assert!(tree[0].children.is_empty());
        assert_eq!(ids(&tree[1].children), vec![4, 3]);
        assert_eq!(ids(&tree[1].children[0].children), vec![5]);
    }

    #[test]
    fn test_build_menu_tree_promotes_orphans() {
        // Parent 10 is not granted, so 11 becomes a root
        let tree = build_menu_tree(vec![menu(11, Some(10), 1), menu(12, None, 0)]);
        assert_eq!(ids(&tree), vec![12, 11]);
    }

    #[test]
    fn test_build_menu_tree_ties_break_on_id() {
        let tree = build_menu_tree(vec![menu(7, None, 1), menu(3, None, 1)]);
        assert_eq!(ids(&tree), vec![3, 7]);
    }

    #[test]
    fn test_build_menu_tree_empty() {
        assert!(build_menu_tree(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_create_menu_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let bad_path = create_test_menu(&db, "Orders", "orders", None, 1).await;
        assert!(matches!(bad_path.unwrap_err(), Error::Validation { .. }));

        let bad_title = create_test_menu(&db, " ", "/orders", None, 1).await;
        assert!(matches!(bad_title.unwrap_err(), Error::Validation { .. }));

        let bad_parent = create_test_menu(&db, "Orders", "/orders", Some(42), 1).await;
        assert!(matches!(bad_parent.unwrap_err(), Error::Validation { .. }));

        create_test_menu(&db, "Orders", "/orders", None, 1).await?;
        let duplicate = create_test_menu(&db, "Orders again", "/orders", None, 2).await;
        assert!(matches!(duplicate.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_menu_rejects_self_parent() -> Result<()> {
        let db = setup_test_db().await?;
        let menu = create_test_menu(&db, "Orders", "/orders", None, 1).await?;
        let result = update_menu(
            &db,
            menu.id,
            MenuInput {
                title: "Orders".to_string(),
                path: "/orders".to_string(),
                icon: None,
                parent_id: Some(menu.id),
                sort_order: 1,
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_menu_rejects_indirect_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let role = create_test_role(&db, "analyst").await?;
        let top = create_test_menu(&db, "Samples", "/samples", None, 1).await?;
        let middle = create_test_menu(&db, "Intake", "/samples/intake", Some(top.id), 1).await?;
        let leaf =
            create_test_menu(&db, "RS1", "/samples/intake/rs1", Some(middle.id), 1).await?;

        let result = update_menu(
            &db,
            top.id,
            MenuInput {
                title: "Samples".to_string(),
                path: "/samples".to_string(),
                icon: None,
                parent_id: Some(leaf.id),
                sort_order: 1,
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        // The rejected update leaves the navigation intact
        assign_menus(&db, role.id, &[top.id, middle.id, leaf.id]).await?;
        let tree = navigation_for_role(&db, role.id).await?;
        assert_eq!(ids(&tree), vec![top.id]);
        assert_eq!(ids(&tree[0].children), vec![middle.id]);

        // Moving a leaf under a sibling branch is still allowed
        let other = create_test_menu(&db, "Reports", "/reports", None, 2).await?;
        let moved = update_menu(
            &db,
            leaf.id,
            MenuInput {
                title: "RS1".to_string(),
                path: "/samples/intake/rs1".to_string(),
                icon: None,
                parent_id: Some(other.id),
                sort_order: 1,
            },
        )
        .await?;
        assert_eq!(moved.parent_id, Some(other.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_menu_detaches_children_and_grants() -> Result<()> {
        let db = setup_test_db().await?;
        let role = create_test_role(&db, "analyst").await?;
        let parent = create_test_menu(&db, "Samples", "/samples", None, 1).await?;
        let child = create_test_menu(&db, "Tracking", "/samples/tracking", Some(parent.id), 1)
            .await?;
        assign_menus(&db, role.id, &[parent.id, child.id]).await?;

        delete_menu(&db, parent.id).await?;

        let menus = list_menus(&db).await?;
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].id, child.id);
        assert_eq!(menus[0].parent_id, None);

        let nav = navigation_for_role(&db, role.id).await?;
        assert_eq!(ids(&nav), vec![child.id]);
        Ok(())
    }

    #[tokio::test]
    async fn test_navigation_for_role_only_granted() -> Result<()> {
        let db = setup_test_db().await?;
        let analyst = create_test_role(&db, "analyst").await?;
        let finance = create_test_role(&db, "finance").await?;
        let samples = create_test_menu(&db, "Samples", "/samples", None, 1).await?;
        let tracking =
            create_test_menu(&db, "Tracking", "/samples/tracking", Some(samples.id), 1).await?;
        let invoices = create_test_menu(&db, "Invoices", "/invoices", None, 2).await?;

        assign_menus(&db, analyst.id, &[samples.id, tracking.id]).await?;
        assign_menus(&db, finance.id, &[invoices.id]).await?;

        let nav = navigation_for_role(&db, analyst.id).await?;
        assert_eq!(ids(&nav), vec![samples.id]);
        assert_eq!(ids(&nav[0].children), vec![tracking.id]);

        let nav = navigation_for_role(&db, finance.id).await?;
        assert_eq!(ids(&nav), vec![invoices.id]);
        Ok(())
    }
}
