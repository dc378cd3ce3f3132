//! Seed data loading from config.toml
//!
//! The seed file lists the roles and sidebar menus a fresh installation starts
//! with. Seeding is idempotent: roles and menus are matched by name and path,
//! and menu grants are only written for roles created by the current run, so
//! grants edited by an administrator are never overwritten on restart.

use crate::{
    core::{
        menu::{MenuInput, create_menu, get_menu_by_path},
        role::{ADMIN_ROLE, RoleInput, assign_menus, create_role, get_role_by_name},
        user::{NewUser, count_users, create_user},
    },
    entities::user,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Structure of the seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedConfig {
    /// Roles to create, with the menu paths they are granted
    #[serde(default)]
    pub roles: Vec<RoleSeed>,
    /// Menus to create, parents before children
    #[serde(default)]
    pub menus: Vec<MenuSeed>,
}

/// A role entry of the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Paths of the menus granted to the role
    #[serde(default)]
    pub menus: Vec<String>,
}

/// A menu entry of the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuSeed {
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Path of the parent menu
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

/// What a seeding run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: usize,
    pub menus_created: usize,
    pub grants_created: usize,
}

/// Parses seed data from TOML text.
///
/// # Errors
/// Returns `Error::Config` if the TOML is invalid or a required field is missing.
pub fn parse_seed_config(contents: &str) -> Result<SeedConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse seed config: {e}"),
    })
}

/// Loads seed data from a TOML file.
///
/// # Errors
/// Returns `Error::Config` if the file cannot be read or parsed.
pub fn load_seed_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!(
            "Failed to read seed config {}: {e}",
            path.as_ref().display()
        ),
    })?;
    parse_seed_config(&contents)
}

async fn seed_menus(db: &DatabaseConnection, menus: &[MenuSeed]) -> Result<usize> {
    let mut created = 0;
    for seed in menus {
        if get_menu_by_path(db, &seed.path).await?.is_some() {
            continue;
        }
        let parent_id = match &seed.parent {
            Some(parent_path) => Some(
                get_menu_by_path(db, parent_path)
                    .await?
                    .ok_or_else(|| Error::Config {
                        message: format!(
                            "Menu '{}' refers to unknown parent '{parent_path}'",
                            seed.path
                        ),
                    })?
                    .id,
            ),
            None => None,
        };
        create_menu(
            db,
            MenuInput {
                title: seed.title.clone(),
                path: seed.path.clone(),
                icon: seed.icon.clone(),
                parent_id,
                sort_order: seed.sort_order,
            },
        )
        .await?;
        created += 1;
    }
    Ok(created)
}

/// Inserts the roles and menus of `config` that do not exist yet.
///
/// # Errors
/// Returns `Error::Config` if a menu refers to an unknown parent or a role to
/// an unknown menu path, and database errors otherwise.
#[instrument(skip(db, config))]
pub async fn seed_from_config(db: &DatabaseConnection, config: &SeedConfig) -> Result<SeedReport> {
    let mut report = SeedReport {
        menus_created: seed_menus(db, &config.menus).await?,
        ..Default::default()
    };

    for seed in &config.roles {
        if get_role_by_name(db, &seed.name).await?.is_some() {
            continue;
        }
        let role = create_role(
            db,
            RoleInput {
                name: seed.name.clone(),
                description: seed.description.clone(),
            },
        )
        .await?;
        report.roles_created += 1;

        let mut menu_ids = Vec::with_capacity(seed.menus.len());
        for path in &seed.menus {
            let menu = get_menu_by_path(db, path)
                .await?
                .ok_or_else(|| Error::Config {
                    message: format!("Role '{}' is granted unknown menu '{path}'", seed.name),
                })?;
            menu_ids.push(menu.id);
        }
        report.grants_created += assign_menus(db, role.id, &menu_ids).await?.len();
    }

    info!(
        roles = report.roles_created,
        menus = report.menus_created,
        grants = report.grants_created,
        "Seed data applied"
    );
    Ok(report)
}

/// Creates the first administrator when the user table is empty.
///
/// Uses the `admin` role, creating it if the seed file did not. Returns the new
/// user, or `None` when users already exist.
///
/// # Errors
/// Returns `Error::Validation` if the credentials are unusable.
#[instrument(skip(db, password))]
pub async fn seed_admin(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> Result<Option<user::Model>> {
    if count_users(db).await? > 0 {
        return Ok(None);
    }

    let role = match get_role_by_name(db, ADMIN_ROLE).await? {
        Some(role) => role,
        None => {
            warn!("No admin role in the seed data, creating one without menus");
            create_role(
                db,
                RoleInput {
                    name: ADMIN_ROLE.to_string(),
                    description: Some("Administrator".to_string()),
                },
            )
            .await?
        }
    };

    let admin = create_user(
        db,
        NewUser {
            name: "Administrator".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role_id: role.id,
        },
    )
    .await?;
    info!(user_id = admin.id, email = %admin.email, "Created initial administrator");
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::{menu::navigation_for_role, role::get_role_menus},
        test_utils::*,
    };

    const SEED: &str = r#"
        [[menus]]
        title = "Dashboard"
        path = "/dashboard"
        sort_order = 1

        [[menus]]
        title = "Samples"
        path = "/samples"
        sort_order = 2

        [[menus]]
        title = "Tracking"
        path = "/samples/tracking"
        parent = "/samples"
        sort_order = 1

        [[roles]]
        name = "admin"
        description = "Administrator"
        menus = ["/dashboard", "/samples", "/samples/tracking"]

        [[roles]]
        name = "analyst"
        menus = ["/samples/tracking"]
    "#;

    #[test]
    fn test_parse_seed_config() {
        let config = parse_seed_config(SEED).unwrap();
        assert_eq!(config.menus.len(), 3);
        assert_eq!(config.menus[2].parent.as_deref(), Some("/samples"));
        assert_eq!(config.roles[1].name, "analyst");
        assert!(config.roles[1].description.is_none());
    }

    #[test]
    fn test_parse_seed_config_rejects_missing_fields() {
        let result = parse_seed_config("[[menus]]\ntitle = \"No path\"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_shipped_seed_file_parses() {
        let config = load_seed_config(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
        assert!(config.roles.iter().any(|r| r.name == ADMIN_ROLE));
    }

    #[tokio::test]
    async fn test_seed_from_config_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_seed_config(SEED)?;

        let first = seed_from_config(&db, &config).await?;
        assert_eq!(
            first,
            SeedReport {
                roles_created: 2,
                menus_created: 3,
                grants_created: 4,
            }
        );

        let second = seed_from_config(&db, &config).await?;
        assert_eq!(second, SeedReport::default());

        let analyst = get_role_by_name(&db, "analyst").await?.unwrap();
        let tree = navigation_for_role(&db, analyst.id).await?;
        // Parent not granted, so the child is promoted to the top level
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].menu.path, "/samples/tracking");
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_keeps_edited_grants() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_seed_config(SEED)?;
        seed_from_config(&db, &config).await?;

        let analyst = get_role_by_name(&db, "analyst").await?.unwrap();
        assign_menus(&db, analyst.id, &[]).await?;
        seed_from_config(&db, &config).await?;
        assert!(get_role_menus(&db, analyst.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_rejects_unknown_references() -> Result<()> {
        let db = setup_test_db().await?;
        let orphan = parse_seed_config(
            "[[menus]]\ntitle = \"Child\"\npath = \"/child\"\nparent = \"/missing\"\n",
        )?;
        assert!(matches!(
            seed_from_config(&db, &orphan).await,
            Err(Error::Config { .. })
        ));

        let bad_grant = parse_seed_config("[[roles]]\nname = \"viewer\"\nmenus = [\"/nowhere\"]\n")?;
        assert!(matches!(
            seed_from_config(&db, &bad_grant).await,
            Err(Error::Config { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_admin_only_on_empty_user_table() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = seed_admin(&db, "admin@lab.test", "change-me-now").await?;
        let admin = admin.unwrap();
        let role = get_role_by_name(&db, ADMIN_ROLE).await?.unwrap();
        assert_eq!(admin.role_id, role.id);

        let again = seed_admin(&db, "other@lab.test", "change-me-now").await?;
        assert!(again.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_admin_reuses_seeded_role() -> Result<()> {
        let db = setup_test_db().await?;
        seed_from_config(&db, &parse_seed_config(SEED)?).await?;
        let seeded = get_role_by_name(&db, ADMIN_ROLE).await?.unwrap();

        let admin = seed_admin(&db, "admin@lab.test", "change-me-now").await?.unwrap();
        assert_eq!(admin.role_id, seeded.id);

        let role = create_test_role(&db, "viewer").await?;
        assert_ne!(role.id, seeded.id);
        Ok(())
    }
}
