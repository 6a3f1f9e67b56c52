use thiserror::Error;
use uuid::Uuid;

use crate::auth::Denial;

/// Message shown to callers in place of internal failure details.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// Represents a malformed identifier in the path.
    #[error("invalid ID: {0}")]
    InvalidId(String),

    /// Represents a request whose contents fail validation.
    #[error("{0}")]
    InvalidInput(String),

    /// Represents a request body that could not be parsed.
    #[error("malformed request body")]
    MalformedBody { source: serde_json::Error },

    /// Represents a missing or unusable session.
    #[error("unauthorized")]
    Unauthorized(Denial),

    /// Represents a failed login.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Represents a reference to something that does not exist.
    #[error("not found")]
    NotFound,

    /// Represents a write that would give an album too many covers.
    #[error("this album already has {limit} covers")]
    CoverLimitReached { limit: usize },

    /// Represents a cover without an album.
    #[error("only media in an album can be a cover")]
    CoverWithoutAlbum,

    /// Represents a duplicate user.
    #[error("a user with that email already exists")]
    EmailAlreadyExists,

    /// Represents deleting a category that media still refers to.
    #[error("category is still in use")]
    CategoryInUse,

    /// Represents deleting one member of a shared album without
    /// saying whether the whole album should go.
    #[error("media {id} shares album {album:?} with {others} other item(s); pass scope=item or scope=album")]
    AlbumScopeRequired {
        id: Uuid,
        album: String,
        others: usize,
    },

    /// Represents a failed request to the media host.
    #[error("media host request failed")]
    MediaHost { source: reqwest::Error },

    /// Represents an error reported by the media host.
    #[error("media host rejected request with status {status}: {message}")]
    MediaHostRejected { status: u16, message: String },

    /// Represents a failure while hashing or checking a password.
    #[error("password hashing failed")]
    Hashing { source: bcrypt::BcryptError },

    /// Represents a failure while signing a session token.
    #[error("token signing failed")]
    Token { source: jsonwebtoken::errors::Error },

    /// Represents a blocking task that panicked or was cancelled.
    #[error("background task failed")]
    Join { source: tokio::task::JoinError },

    /// Represents stored data that does not match the schema.
    #[error("unexpected {column} value {value:?}")]
    UnexpectedValue { column: &'static str, value: String },
}

impl BackendError {
    /// Whether the error stems from a bug or an unavailable dependency
    /// rather than from the request.
    pub fn is_internal(&self) -> bool {
        use BackendError::*;

        matches!(
            self,
            Sqlx { .. }
                | MediaHost { .. }
                | MediaHostRejected { .. }
                | Hashing { .. }
                | Token { .. }
                | Join { .. }
                | UnexpectedValue { .. }
        )
    }

    /// The message to show the caller.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_ERROR_MESSAGE.to_owned()
        } else {
            format!("{}", self)
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(source: sqlx::Error) -> Self {
        BackendError::Sqlx { source }
    }
}

/// Parses an identifier taken from a request path.
pub fn parse_id(raw: &str) -> Result<Uuid, BackendError> {
    Uuid::parse_str(raw).map_err(|_| BackendError::InvalidId(raw.to_owned()))
}
