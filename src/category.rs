use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Db;
use crate::errors::BackendError;
use crate::media::MediaKind;
use crate::normalization::deserialize_option;
use crate::times::Times;

/// A classification that media is filed under.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,

    #[serde(rename = "type")]
    pub kind: MediaKind,

    pub active: bool,

    #[serde(flatten)]
    pub times: Times,
}

#[derive(Clone, Debug)]
pub struct NewCategory {
    pub name: String,
    pub kind: MediaKind,
    pub active: bool,
}

impl NewCategory {
    pub fn into_category(self, id: Uuid, times: Times) -> Category {
        Category {
            id,
            name: self.name,
            kind: self.kind,
            active: self.active,
            times,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    #[serde(default, deserialize_with = "deserialize_option")]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<MediaKind>,

    #[serde(default)]
    pub active: Option<bool>,
}

/// Filters for listing categories. Unrecognized query values are
/// ignored rather than rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct CategoryFilter {
    pub kind: Option<MediaKind>,
    pub active: Option<bool>,
}

impl CategoryFilter {
    pub fn active() -> Self {
        CategoryFilter {
            kind: None,
            active: Some(true),
        }
    }
}

impl From<&CategoryQuery> for CategoryFilter {
    fn from(query: &CategoryQuery) -> Self {
        CategoryFilter {
            kind: query.kind.as_deref().and_then(|k| k.parse().ok()),
            active: query.active.as_deref().and_then(parse_flag),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub active: Option<String>,
}

/// Parses `true`/`false` query values, ignoring anything else.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub async fn create(db: &dyn Db, payload: CategoryPayload) -> Result<Category, BackendError> {
    let name = payload
        .name
        .ok_or_else(|| BackendError::InvalidInput("name and type are required".to_owned()))?;
    let kind: MediaKind = payload
        .kind
        .ok_or_else(|| BackendError::InvalidInput("name and type are required".to_owned()))?
        .parse()?;

    db.insert_category(NewCategory {
        name,
        kind,
        active: payload.active.unwrap_or(true),
    })
    .await
}

pub async fn update(db: &dyn Db, id: &Uuid, patch: CategoryPatch) -> Result<Category, BackendError> {
    use crate::normalization::normalize_text;

    let mut category = db.retrieve_category(id).await?.ok_or(BackendError::NotFound)?;

    if let Some(name) = patch.name {
        let name = normalize_text(name);

        if name.is_empty() {
            return Err(BackendError::InvalidInput("name must not be empty".to_owned()));
        }

        category.name = name;
    }

    if let Some(kind) = patch.kind {
        category.kind = kind;
    }

    if let Some(active) = patch.active {
        category.active = active;
    }

    db.update_category(category).await?.ok_or(BackendError::NotFound)
}

pub async fn delete(db: &dyn Db, id: &Uuid) -> Result<(), BackendError> {
    if db.delete_category(id).await? {
        Ok(())
    } else {
        Err(BackendError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDb;

    fn payload(json: serde_json::Value) -> CategoryPayload {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn categories_need_a_name_and_type() {
        let db = MemoryDb::new();

        let result = create(&db, payload(serde_json::json!({ "name": "   ", "type": "photo" }))).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));

        let result = create(&db, payload(serde_json::json!({ "name": "Banner", "type": "audio" }))).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));

        let created = create(&db, payload(serde_json::json!({ "name": " Banner ", "type": "photo" })))
            .await
            .unwrap();
        assert_eq!(created.name, "Banner");
        assert!(created.active);
    }

    #[tokio::test]
    async fn partial_updates_keep_other_fields() {
        let db = MemoryDb::new();
        let created = create(&db, payload(serde_json::json!({ "name": "Footer", "type": "video", "active": false })))
            .await
            .unwrap();

        let patch = CategoryPatch {
            active: Some(true),
            ..Default::default()
        };
        let updated = update(&db, &created.id, patch).await.unwrap();

        assert_eq!(updated.name, "Footer");
        assert_eq!(updated.kind, MediaKind::Video);
        assert!(updated.active);

        let missing = update(&db, &Uuid::new_v4(), CategoryPatch::default()).await;
        assert!(matches!(missing, Err(BackendError::NotFound)));
    }

    #[test]
    fn unrecognized_filters_are_ignored() {
        let query = CategoryQuery {
            kind: Some("audio".to_owned()),
            active: Some("yes".to_owned()),
        };
        let filter = CategoryFilter::from(&query);

        assert_eq!(filter.kind, None);
        assert_eq!(filter.active, None);

        let query = CategoryQuery {
            kind: Some("video".to_owned()),
            active: Some("false".to_owned()),
        };
        let filter = CategoryFilter::from(&query);

        assert_eq!(filter.kind, Some(MediaKind::Video));
        assert_eq!(filter.active, Some(false));
    }
}
