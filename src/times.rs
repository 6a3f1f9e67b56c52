use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The times a stored entity was created and last modified.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    /// The date and time it was created.
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,

    /// The date and time it was last modified.
    #[serde(with = "time::serde::timestamp")]
    pub updated_at: OffsetDateTime,
}

impl Times {
    pub fn new(created_at: OffsetDateTime, updated_at: OffsetDateTime) -> Self {
        Self {
            created_at,
            updated_at,
        }
    }

    /// Both times set to the current instant.
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();

        Self::new(now, now)
    }

    /// A copy with `updated_at` moved to the current instant.
    pub fn touched(self) -> Self {
        Self {
            updated_at: OffsetDateTime::now_utc(),
            ..self
        }
    }
}
