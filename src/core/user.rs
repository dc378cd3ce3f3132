//! User business logic - dashboard accounts and their role assignment.
//!
//! Emails are unique and stored lowercase; passwords are hashed before they reach
//! the database. All functions are async and return `Result` types.

use crate::{
    core::auth::{hash_password, normalize_email},
    entities::{Role, User, role, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A user as shown to clients, with the role name resolved and no password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role_id: i64,
    pub role_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserView {
    /// Combines a user row with its (optional) role row.
    #[must_use]
    pub fn new(user: user::Model, role: Option<&role::Model>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role_id: user.role_id,
            role_name: role.map(|r| r.name.clone()),
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Fields required to create a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: i64,
}

/// Partial update of a user; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("User name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(Error::validation(format!("Invalid email address: '{email}'")));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

async fn ensure_role_exists<C: ConnectionTrait>(db: &C, role_id: i64) -> Result<()> {
    if Role::find_by_id(role_id).one(db).await?.is_none() {
        return Err(Error::validation(format!("Role {role_id} does not exist")));
    }
    Ok(())
}

async fn ensure_email_free<C: ConnectionTrait>(
    db: &C,
    email: &str,
    except_user: Option<i64>,
) -> Result<()> {
    let mut query = User::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except_user {
        query = query.filter(user::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::validation(format!("Email '{email}' is already in use")));
    }
    Ok(())
}

/// Lists every user with the name of their role, ordered by name.
pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<UserView>> {
    let rows = User::find()
        .find_also_related(Role)
        .order_by_asc(user::Column::Name)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(user, role)| UserView::new(user, role.as_ref()))
        .collect())
}

/// Finds a user by id.
pub async fn get_user(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by id together with the role name.
pub async fn get_user_view(db: &DatabaseConnection, user_id: i64) -> Result<UserView> {
    let (user, role) = User::find_by_id(user_id)
        .find_also_related(Role)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))?;
    Ok(UserView::new(user, role.as_ref()))
}

/// Number of user accounts.
pub async fn count_users(db: &DatabaseConnection) -> Result<u64> {
    User::find().count(db).await.map_err(Into::into)
}

/// Creates a user after validating every field.
///
/// # Errors
/// Returns `Error::Validation` if the name is empty, the email is malformed or
/// taken, the password is too short, or the role does not exist.
#[instrument(skip(db, new_user), fields(email = %new_user.email))]
pub async fn create_user(db: &DatabaseConnection, new_user: NewUser) -> Result<user::Model> {
    let name = validate_name(&new_user.name)?;
    let email = validate_email(&new_user.email)?;
    validate_password(&new_user.password)?;
    ensure_role_exists(db, new_user.role_id).await?;
    ensure_email_free(db, &email, None).await?;

    let now = Utc::now();
    let user = user::ActiveModel {
        name: Set(name),
        email: Set(email),
        password_hash: Set(hash_password(&new_user.password)?),
        role_id: Set(new_user.role_id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let user = user.insert(db).await?;
    info!(user_id = user.id, "Created user");
    Ok(user)
}

/// Applies a partial update to a user.
#[instrument(skip(db, update))]
pub async fn update_user(
    db: &DatabaseConnection,
    user_id: i64,
    update: UserUpdate,
) -> Result<user::Model> {
    let mut user: user::ActiveModel = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))?
        .into();

    if let Some(name) = update.name {
        user.name = Set(validate_name(&name)?);
    }
    if let Some(email) = update.email {
        let email = validate_email(&email)?;
        ensure_email_free(db, &email, Some(user_id)).await?;
        user.email = Set(email);
    }
    if let Some(password) = update.password {
        validate_password(&password)?;
        user.password_hash = Set(hash_password(&password)?);
    }
    if let Some(role_id) = update.role_id {
        ensure_role_exists(db, role_id).await?;
        user.role_id = Set(role_id);
    }
    if let Some(is_active) = update.is_active {
        user.is_active = Set(is_active);
    }
    user.updated_at = Set(Utc::now());

    let user = user.update(db).await?;
    info!(user_id = user.id, "Updated user");
    Ok(user)
}

/// Permanently deletes a user.
#[instrument(skip(db))]
pub async fn delete_user(db: &DatabaseConnection, user_id: i64) -> Result<()> {
    let result = User::delete_by_id(user_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("User", user_id));
    }
    info!(user_id, "Deleted user");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_user(email: &str, password: &str, role_id: i64) -> NewUser {
        NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role_id,
        }
    }

    #[tokio::test]
    async fn test_create_user_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_user(
            &db,
            NewUser {
                name: "   ".to_string(),
                ..new_user("a@b.c", "password123", 1)
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_user(&db, new_user("not-an-email", "password123", 1)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_user(&db, new_user("a@b.c", "short", 1)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_user_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let role = create_test_role(&db, "analyst").await?;

        let user = create_user(&db, new_user(" Ana@Lab.Test ", "password123", role.id)).await?;
        assert_eq!(user.email, "ana@lab.test");
        assert!(user.is_active);
        assert_ne!(user.password_hash, "password123");

        // Duplicate email, regardless of case
        let duplicate = create_user(&db, new_user("ANA@lab.test", "password123", role.id)).await;
        assert!(matches!(duplicate.unwrap_err(), Error::Validation { .. }));

        // Unknown role
        let orphan = create_user(&db, new_user("bob@lab.test", "password123", 999)).await;
        assert!(matches!(orphan.unwrap_err(), Error::Validation { .. }));

        assert_eq!(count_users(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_users_includes_role_name() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_role(&db, "admin").await?;
        let analyst = create_test_role(&db, "analyst").await?;
        create_test_user(&db, "zed@lab.test", "password123", admin.id).await?;
        create_test_user(&db, "amy@lab.test", "password123", analyst.id).await?;

        let users = list_users(&db).await?;
        assert_eq!(users.len(), 2);
        let roles: Vec<_> = users.iter().map(|u| u.role_name.clone().unwrap()).collect();
        assert!(roles.contains(&"admin".to_string()));
        assert!(roles.contains(&"analyst".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_user_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let role = create_test_role(&db, "analyst").await?;
        let other_role = create_test_role(&db, "finance").await?;
        let user = create_test_user(&db, "ana@lab.test", "password123", role.id).await?;
        create_test_user(&db, "bob@lab.test", "password123", role.id).await?;

        let updated = update_user(
            &db,
            user.id,
            UserUpdate {
                name: Some("Ana Maria".to_string()),
                role_id: Some(other_role.id),
                password: Some("new-password".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.role_id, other_role.id);
        assert!(crate::core::auth::verify_password(
            "new-password",
            &updated.password_hash
        ));

        // Taking another user's email is rejected
        let clash = update_user(
            &db,
            user.id,
            UserUpdate {
                email: Some("bob@lab.test".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(clash.unwrap_err(), Error::Validation { .. }));

        // Re-saving the own email is fine
        update_user(
            &db,
            user.id,
            UserUpdate {
                email: Some("ANA@lab.test".to_string()),
                ..Default::default()
            },
        )
        .await?;

        let missing = update_user(&db, 999, UserUpdate::default()).await;
        assert!(matches!(missing.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_user_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let role = create_test_role(&db, "analyst").await?;
        let user = create_test_user(&db, "ana@lab.test", "password123", role.id).await?;

        delete_user(&db, user.id).await?;
        assert!(get_user(&db, user.id).await?.is_none());

        let again = delete_user(&db, user.id).await;
        assert!(matches!(again.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }
}
