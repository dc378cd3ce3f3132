//! Menu entity - Navigation entries of the dashboard.
//!
//! Menus form a tree through the optional `parent_id` and are granted to roles
//! through the `role_menus` join table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Menu database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "menus")]
pub struct Model {
    /// Unique identifier for the menu
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Label shown in the sidebar
    pub title: String,
    /// Route of the page, always starting with `/`
    #[sea_orm(unique)]
    pub path: String,
    /// Optional icon name understood by the frontend
    pub icon: Option<String>,
    /// Parent menu, None for top-level entries
    pub parent_id: Option<i64>,
    /// Position among siblings, ascending
    pub sort_order: i32,
    /// When the menu was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Menu and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One menu is granted through many role_menus rows
    #[sea_orm(has_many = "super::role_menu::Entity")]
    RoleMenus,
}

impl Related<super::role_menu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoleMenus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
