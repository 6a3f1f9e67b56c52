//! Session tokens and password hashing.
//!
//! A session is a signed JWT carried in an HTTP-only cookie. Handlers
//! ask `authorize` for an `Authorization` and decide what a denial means
//! for them; nothing here rejects a request by itself.

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::BackendError;

/// The cookie that carries the session token.
pub const TOKEN_COOKIE: &str = "token";

/// Seven days.
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            _ => Err(BackendError::UnexpectedValue {
                column: "role",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The signed-in user a request acts for.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Session {
    #[serde(rename = "id")]
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Why a request has no usable session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Denial {
    MissingToken,
    InvalidToken,
    ExpiredToken,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Authorization {
    Granted(Session),
    Denied(Denial),
}

impl Authorization {
    pub fn session(self) -> Result<Session, BackendError> {
        match self {
            Authorization::Granted(session) => Ok(session),
            Authorization::Denied(denial) => Err(BackendError::Unauthorized(denial)),
        }
    }
}

/// The secret and lifetime of session tokens.
#[derive(Clone)]
pub struct TokenKeys {
    secret: Vec<u8>,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenKeys {
    pub fn new(secret: impl AsRef<[u8]>, ttl_seconds: i64) -> Self {
        TokenKeys {
            secret: secret.as_ref().to_vec(),
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Signs a token for `session`, valid from now for the configured
    /// lifetime.
    pub fn issue(&self, session: &Session) -> Result<String, BackendError> {
        let iat = OffsetDateTime::now_utc().unix_timestamp();

        self.sign(&Claims {
            sub: session.user_id.to_string(),
            email: session.email.clone(),
            role: session.role,
            iat,
            exp: iat + self.ttl_seconds,
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, BackendError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|source| BackendError::Token { source })
    }

    /// Checks a token's signature, expiry and claims.
    pub fn verify(&self, token: &str) -> Authorization {
        use jsonwebtoken::errors::ErrorKind;

        let validation = Validation::new(Algorithm::HS256);

        let claims = match decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Authorization::Denied(match e.kind() {
                    ErrorKind::ExpiredSignature => Denial::ExpiredToken,
                    _ => Denial::InvalidToken,
                })
            }
        };

        match Uuid::parse_str(&claims.sub) {
            Ok(user_id) if !claims.email.is_empty() => Authorization::Granted(Session {
                user_id,
                email: claims.email,
                role: claims.role,
            }),
            _ => Authorization::Denied(Denial::InvalidToken),
        }
    }
}

/// Authorizes a request from the value of its session cookie.
pub fn authorize(keys: &TokenKeys, token: Option<&str>) -> Authorization {
    match token.filter(|token| !token.is_empty()) {
        Some(token) => keys.verify(token),
        None => Authorization::Denied(Denial::MissingToken),
    }
}

/// The `set-cookie` value that stores a session token.
pub fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        TOKEN_COOKIE,
        token,
        max_age,
        if secure { "; Secure" } else { "" }
    )
}

/// The `set-cookie` value that removes the session token.
pub fn clear_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, BackendError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|source| BackendError::Join { source })?
        .map_err(|source| BackendError::Hashing { source })
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, BackendError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|source| BackendError::Join { source })?
        .map_err(|source| BackendError::Hashing { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret", DEFAULT_TOKEN_TTL_SECONDS)
    }

    fn session() -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: "admin@example.com".to_owned(),
            role: Role::Admin,
        }
    }

    #[test]
    fn issued_tokens_are_accepted() {
        let keys = keys();
        let session = session();
        let token = keys.issue(&session).unwrap();

        assert_eq!(authorize(&keys, Some(&token)), Authorization::Granted(session));
    }

    #[test]
    fn missing_cookies_are_denied() {
        assert_eq!(
            authorize(&keys(), None),
            Authorization::Denied(Denial::MissingToken)
        );
        assert_eq!(
            authorize(&keys(), Some("")),
            Authorization::Denied(Denial::MissingToken)
        );
    }

    #[test]
    fn foreign_signatures_are_denied() {
        let token = TokenKeys::new("other-secret", 60).issue(&session()).unwrap();

        assert_eq!(keys().verify(&token), Authorization::Denied(Denial::InvalidToken));
        assert_eq!(keys().verify("garbage"), Authorization::Denied(Denial::InvalidToken));
    }

    #[test]
    fn expired_tokens_are_denied() {
        let keys = keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let token = keys
            .sign(&Claims {
                sub: Uuid::new_v4().to_string(),
                email: "admin@example.com".to_owned(),
                role: Role::Admin,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        assert_eq!(keys.verify(&token), Authorization::Denied(Denial::ExpiredToken));
    }

    #[test]
    fn subjects_must_be_ids() {
        let keys = keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let token = keys
            .sign(&Claims {
                sub: "someone".to_owned(),
                email: "admin@example.com".to_owned(),
                role: Role::Admin,
                iat: now,
                exp: now + 60,
            })
            .unwrap();

        assert_eq!(keys.verify(&token), Authorization::Denied(Denial::InvalidToken));
    }

    #[test]
    fn denials_become_unauthorized_errors() {
        let result = Authorization::Denied(Denial::MissingToken).session();

        assert!(matches!(result, Err(BackendError::Unauthorized(Denial::MissingToken))));
    }

    #[test]
    fn cookies_are_http_only() {
        assert_eq!(
            session_cookie("abc", 60, true),
            "token=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=60; Secure"
        );
        assert_eq!(
            clear_cookie(false),
            "token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
        );
    }

    #[tokio::test]
    async fn passwords_round_trip_through_bcrypt() {
        let hash = hash_password("hunter22".to_owned(), 4).await.unwrap();

        assert!(verify_password("hunter22".to_owned(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter23".to_owned(), hash).await.unwrap());
    }
}
