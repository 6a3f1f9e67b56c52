use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, Role, Session, TokenKeys};
use crate::db::Db;
use crate::errors::BackendError;
use crate::normalization::{deserialize_option, deserialize_patch, normalize_email};
use crate::times::Times;

/// An account that can sign in to the back office. Never carries the
/// password hash.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub name: Option<String>,

    #[serde(flatten)]
    pub times: Times,
}

impl User {
    pub fn session(&self) -> Session {
        Session {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// A user together with their password hash, for signing in.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
}

/// Changes to a stored user. `name: Some(None)` clears the name.
#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default, deserialize_with = "deserialize_patch")]
    pub name: Option<Option<String>>,
}

/// Checks an email and password, returning the user and a fresh session
/// token. Unknown emails and wrong passwords are indistinguishable.
pub async fn login(
    db: &dyn Db,
    keys: &TokenKeys,
    payload: LoginPayload,
) -> Result<(User, String), BackendError> {
    let email = normalize_email(&payload.email);

    if email.is_empty() || payload.password.is_empty() {
        return Err(BackendError::InvalidInput(
            "email and password are required".to_owned(),
        ));
    }

    let credentials = db
        .retrieve_credentials(&email)
        .await?
        .ok_or(BackendError::InvalidCredentials)?;

    if !verify_password(payload.password, credentials.password_hash).await? {
        return Err(BackendError::InvalidCredentials);
    }

    let token = keys.issue(&credentials.user.session())?;

    Ok((credentials.user, token))
}

pub async fn create(db: &dyn Db, cost: u32, payload: UserPayload) -> Result<User, BackendError> {
    let email = payload.email.map(normalize_email).unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(BackendError::InvalidInput(
            "email and password are required".to_owned(),
        ));
    }

    let password_hash = hash_password(password, cost).await?;

    db.insert_user(NewUser {
        email,
        password_hash,
        name: payload.name,
    })
    .await
}

pub async fn update(
    db: &dyn Db,
    cost: u32,
    id: &Uuid,
    patch: UserPatch,
) -> Result<User, BackendError> {
    let email = match patch.email {
        Some(email) => {
            let email = normalize_email(email);

            if email.is_empty() {
                return Err(BackendError::InvalidInput("email must not be empty".to_owned()));
            }

            Some(email)
        }
        None => None,
    };

    let password_hash = match patch.password {
        Some(password) if password.is_empty() => {
            return Err(BackendError::InvalidInput("password must not be empty".to_owned()));
        }
        Some(password) => Some(hash_password(password, cost).await?),
        None => None,
    };

    if email.is_none() && password_hash.is_none() && patch.name.is_none() {
        return Err(BackendError::InvalidInput("nothing to update".to_owned()));
    }

    let changes = UserChanges {
        email,
        password_hash,
        name: patch.name,
    };

    db.update_user(id, changes).await?.ok_or(BackendError::NotFound)
}

pub async fn delete(db: &dyn Db, id: &Uuid) -> Result<(), BackendError> {
    if db.delete_user(id).await? {
        Ok(())
    } else {
        Err(BackendError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{authorize, Authorization};
    use crate::db::memory::MemoryDb;

    const COST: u32 = 4;

    fn payload(email: &str, password: &str) -> UserPayload {
        UserPayload {
            email: Some(email.to_owned()),
            password: Some(password.to_owned()),
            name: None,
        }
    }

    #[tokio::test]
    async fn users_sign_in_with_their_password() {
        let db = MemoryDb::new();
        let keys = TokenKeys::new("secret", 60);
        let user = create(&db, COST, payload(" Admin@Example.com ", "hunter22")).await.unwrap();

        assert_eq!(user.email, "admin@example.com");

        let (signed_in, token) = login(
            &db,
            &keys,
            LoginPayload {
                email: "ADMIN@example.com".to_owned(),
                password: "hunter22".to_owned(),
            },
        )
        .await
        .unwrap();

        assert_eq!(signed_in.id, user.id);

        assert_eq!(
            authorize(&keys, Some(&token)),
            Authorization::Granted(user.session())
        );
    }

    #[tokio::test]
    async fn wrong_passwords_and_unknown_emails_look_alike() {
        let db = MemoryDb::new();
        let keys = TokenKeys::new("secret", 60);
        create(&db, COST, payload("admin@example.com", "hunter22")).await.unwrap();

        for (email, password) in &[("admin@example.com", "wrong"), ("nobody@example.com", "hunter22")] {
            let result = login(
                &db,
                &keys,
                LoginPayload {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await;

            assert!(matches!(result, Err(BackendError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn empty_updates_are_rejected() {
        let db = MemoryDb::new();
        let user = create(&db, COST, payload("admin@example.com", "hunter22")).await.unwrap();

        let result = update(&db, COST, &user.id, UserPatch::default()).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));

        let patch = UserPatch {
            password: Some(String::new()),
            ..Default::default()
        };
        let result = update(&db, COST, &user.id, patch).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));

        let patch = UserPatch {
            name: Some(Some("Ana".to_owned())),
            ..Default::default()
        };
        let updated = update(&db, COST, &user.id, patch).await.unwrap();
        assert_eq!(updated.name.as_deref(), Some("Ana"));

        let patch = UserPatch {
            email: Some("other@example.com".to_owned()),
            ..Default::default()
        };
        let result = update(&db, COST, &Uuid::new_v4(), patch).await;
        assert!(matches!(result, Err(BackendError::NotFound)));
    }

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let db = MemoryDb::new();
        create(&db, COST, payload("admin@example.com", "hunter22")).await.unwrap();

        let result = create(&db, COST, payload("ADMIN@example.com ", "other")).await;

        assert!(matches!(result, Err(BackendError::EmailAlreadyExists)));
    }
}
