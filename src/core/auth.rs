//! Authentication - password hashing, session tokens and the credentials login.
//!
//! A successful login issues an HS256 JWT that the HTTP layer stores in the
//! `session` cookie. The token carries the user id and role so navigation can be
//! resolved without another lookup; the HTTP layer still re-loads the user on
//! every request so deactivation takes effect immediately.

use crate::{
    entities::{Role, User, role, user},
    errors::{Error, Result},
};
use argon2::Argon2;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use sea_orm::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "session";

/// Claims stored in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id, as a string per the JWT convention
    pub sub: String,
    /// Role id at the time of login
    pub role_id: i64,
    /// Role name at the time of login
    pub role: String,
    /// User display name
    pub name: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

impl SessionClaims {
    /// Id of the signed-in user.
    ///
    /// # Errors
    /// Returns `Error::Unauthorized` if `sub` is not a numeric id.
    pub fn user_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| Error::Unauthorized {
            message: "invalid session subject".to_string(),
        })
    }
}

/// Result of a successful credentials login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Signed session token
    pub token: String,
    /// The authenticated user
    pub user: user::Model,
    /// The user's role
    pub role: role::Model,
}

/// Hashes a plain password with argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Verifies a password against an argon2id hash. A malformed hash never matches.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Signs a session token for `user` valid for `ttl_seconds`.
pub fn issue_session(
    user: &user::Model,
    role: &role::Model,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user.id.to_string(),
        role_id: role.id,
        role: role.name.clone(),
        name: user.name.clone(),
        iat: now,
        exp: now + ttl_seconds,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(Into::into)
}

/// Decodes and validates a session token.
///
/// # Errors
/// Returns `Error::Unauthorized` if the signature is wrong or the token expired.
pub fn verify_session(token: &str, secret: &str) -> Result<SessionClaims> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| Error::Unauthorized {
        message: format!("invalid session: {e}"),
    })
}

/// Normalizes an email address for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> Error {
    Error::Unauthorized {
        message: "Invalid credentials".to_string(),
    }
}

/// Checks an email/password pair and issues a session token.
///
/// Unknown emails, inactive accounts and wrong passwords all fail with the same
/// `Error::Unauthorized` so the response does not reveal which accounts exist.
#[instrument(skip(db, password, secret))]
pub async fn login(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    secret: &str,
    ttl_seconds: i64,
) -> Result<LoginOutcome> {
    let email = normalize_email(email);
    let Some(user) = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    else {
        warn!("Login attempt for unknown email");
        return Err(invalid_credentials());
    };

    if !user.is_active {
        warn!(user_id = user.id, "Login attempt for inactive user");
        return Err(invalid_credentials());
    }

    if !verify_password(password, &user.password_hash) {
        warn!(user_id = user.id, "Login attempt with wrong password");
        return Err(invalid_credentials());
    }

    let role = Role::find_by_id(user.role_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Role", user.role_id))?;

    let token = issue_session(&user, &role, secret, ttl_seconds)?;
    info!(user_id = user.id, role = %role.name, "User signed in");
    Ok(LoginOutcome { token, user, role })
}

/// `Set-Cookie` value carrying a session token.
#[must_use]
pub fn session_cookie(token: &str, ttl_seconds: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={ttl_seconds}{secure}")
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_hash_and_verify_password() -> Result<()> {
        let hash = hash_password("correct horse battery")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong", &hash));
        Ok(())
    }

    #[test]
    fn test_verify_password_with_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_session_round_trip() -> Result<()> {
        let (user, role) = sample_user_and_role();
        let token = issue_session(&user, &role, "secret", 60)?;
        let claims = verify_session(&token, "secret")?;
        assert_eq!(claims.user_id()?, user.id);
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 60);
        Ok(())
    }

    #[test]
    fn test_session_rejects_wrong_secret_and_expiry() -> Result<()> {
        let (user, role) = sample_user_and_role();
        let token = issue_session(&user, &role, "secret", 60)?;
        assert!(matches!(
            verify_session(&token, "other"),
            Err(Error::Unauthorized { .. })
        ));

        let expired = issue_session(&user, &role, "secret", -120)?;
        assert!(matches!(
            verify_session(&expired, "secret"),
            Err(Error::Unauthorized { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc", 3600, false);
        assert_eq!(
            cookie,
            "session=abc; HttpOnly; Path=/; SameSite=Lax; Max-Age=3600"
        );
        assert!(session_cookie("abc", 1, true).ends_with("; Secure"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_login_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let role = create_test_role(&db, "analyst").await?;
        create_test_user(&db, "Ana@Lab.test", "password123", role.id).await?;

        let outcome = login(&db, "  ana@lab.TEST ", "password123", "secret", 60).await?;
        assert_eq!(outcome.user.email, "ana@lab.test");
        assert_eq!(outcome.role.name, "analyst");
        let claims = verify_session(&outcome.token, "secret")?;
        assert_eq!(claims.user_id()?, outcome.user.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() -> Result<()> {
        let db = setup_test_db().await?;
        let role = create_test_role(&db, "analyst").await?;
        let user = create_test_user(&db, "ana@lab.test", "password123", role.id).await?;

        let wrong_password = login(&db, "ana@lab.test", "nope-nope", "s", 60).await;
        let unknown = login(&db, "who@lab.test", "password123", "s", 60).await;
        for result in [wrong_password, unknown] {
            match result {
                Err(Error::Unauthorized { message }) => assert_eq!(message, "Invalid credentials"),
                other => panic!("expected Unauthorized, got {other:?}"),
            }
        }

        crate::core::user::update_user(
            &db,
            user.id,
            crate::core::user::UserUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?;
        let inactive = login(&db, "ana@lab.test", "password123", "s", 60).await;
        assert!(matches!(inactive, Err(Error::Unauthorized { .. })));
        Ok(())
    }
}
