//! Role entity - A named group of users sharing the same navigation menus.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    /// Unique identifier for the role
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique role name (e.g., "admin", "analyst")
    #[sea_orm(unique)]
    pub name: String,
    /// Optional free-text description shown in the role list
    pub description: Option<String>,
    /// When the role was created
    pub created_at: DateTimeUtc,
    /// When the role was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Role and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One role is assigned to many users
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
    /// One role has many menu grants
    #[sea_orm(has_many = "super::role_menu::Entity")]
    RoleMenus,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::role_menu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoleMenus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
