use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, Logger};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::albums;
use crate::db::Db;
use crate::errors::BackendError;
use crate::host::MediaHost;
use crate::normalization::{deserialize_option, deserialize_patch};
use crate::times::Times;

/// What kind of asset a record (or a category) holds.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            _ => Err(BackendError::InvalidInput(format!(
                "type must be photo or video, not {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the external host files an asset. Only used to delete it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalAssetKind {
    Image,
    Video,
}

impl Default for ExternalAssetKind {
    fn default() -> Self {
        ExternalAssetKind::Image
    }
}

impl ExternalAssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalAssetKind::Image => "image",
            ExternalAssetKind::Video => "video",
        }
    }
}

impl FromStr for ExternalAssetKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ExternalAssetKind::Image),
            "video" => Ok(ExternalAssetKind::Video),
            _ => Err(BackendError::InvalidInput(format!(
                "resourceType must be image or video, not {:?}",
                s
            ))),
        }
    }
}

/// One uploaded asset.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MediaRecord {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub kind: MediaKind,

    #[serde(rename = "category")]
    pub category_id: Uuid,

    /// Never blank; `None` when the record stands alone.
    pub album: Option<String>,

    #[serde(rename = "esPortada")]
    pub is_cover: bool,

    #[serde(rename = "isFeatured")]
    pub is_featured: bool,

    pub title: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: String,

    #[serde(rename = "thumbnail")]
    pub thumbnail_url: Option<String>,

    #[serde(rename = "publicId")]
    pub public_id: Option<String>,

    #[serde(rename = "resourceType")]
    pub resource_type: Option<ExternalAssetKind>,

    #[serde(rename = "fullVideoUrl")]
    pub full_video_url: Option<String>,

    #[serde(flatten)]
    pub times: Times,
}

impl MediaRecord {
    /// The external asset to remove along with this record, if any.
    pub fn external_asset(&self) -> Option<(&str, ExternalAssetKind)> {
        self.public_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| (id, self.resource_type.unwrap_or_default()))
    }

    /// Checks the invariants that do not depend on other records.
    pub fn validate(&self) -> Result<(), BackendError> {
        check_record(self.is_cover, self.album.as_deref(), &self.url)
    }
}

fn check_record(is_cover: bool, album: Option<&str>, url: &str) -> Result<(), BackendError> {
    if is_cover && album.is_none() {
        return Err(BackendError::CoverWithoutAlbum);
    }

    if url.is_empty() {
        return Err(BackendError::InvalidInput("url must not be empty".to_owned()));
    }

    Ok(())
}

/// A record that has not been stored yet.
#[derive(Clone, Debug)]
pub struct NewMedia {
    pub kind: MediaKind,
    pub category_id: Uuid,
    pub album: Option<String>,
    pub is_cover: bool,
    pub is_featured: bool,
    pub title: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub public_id: Option<String>,
    pub resource_type: Option<ExternalAssetKind>,
    pub full_video_url: Option<String>,
}

impl NewMedia {
    pub fn validate(&self) -> Result<(), BackendError> {
        check_record(self.is_cover, self.album.as_deref(), &self.url)
    }

    pub fn into_record(self, id: Uuid, times: Times) -> MediaRecord {
        MediaRecord {
            id,
            kind: self.kind,
            category_id: self.category_id,
            album: self.album,
            is_cover: self.is_cover,
            is_featured: self.is_featured,
            title: self.title,
            name: self.name,
            description: self.description,
            url: self.url,
            thumbnail_url: self.thumbnail_url,
            public_id: self.public_id,
            resource_type: self.resource_type,
            full_video_url: self.full_video_url,
            times,
        }
    }
}

/// The body of an upload confirmation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    #[serde(rename = "type")]
    pub kind: MediaKind,

    pub category: Uuid,

    pub url: String,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub album: Option<String>,

    #[serde(default)]
    pub es_portada: Option<bool>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub thumbnail: Option<String>,

    #[serde(default)]
    pub is_featured: Option<bool>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub public_id: Option<String>,

    #[serde(default)]
    pub resource_type: Option<ExternalAssetKind>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub full_video_url: Option<String>,
}

/// A partial update. `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPatch {
    #[serde(default, deserialize_with = "deserialize_patch")]
    pub title: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_patch")]
    pub name: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_patch")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_patch")]
    pub album: Option<Option<String>>,

    #[serde(default)]
    pub es_portada: Option<bool>,

    #[serde(default)]
    pub is_featured: Option<bool>,

    #[serde(default, deserialize_with = "deserialize_patch")]
    pub thumbnail: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_patch")]
    pub full_video_url: Option<Option<String>>,
}

impl MediaPatch {
    pub fn apply(self, record: &mut MediaRecord) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }

        set(&mut record.title, self.title);
        set(&mut record.name, self.name);
        set(&mut record.description, self.description);
        set(&mut record.album, self.album);
        set(&mut record.is_cover, self.es_portada);
        set(&mut record.is_featured, self.is_featured);
        set(&mut record.thumbnail_url, self.thumbnail);
        set(&mut record.full_video_url, self.full_video_url);
    }
}

/// Which records a `DELETE /media/{id}` removes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DeleteScope {
    /// Only the addressed record.
    Item,
    /// Every member of the addressed record's album.
    Album,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeletion {
    pub deleted: u64,
    pub cloudinary_deleted: usize,
    pub album: Option<String>,
}

/// Filters for listing media. `None` means "don't filter".
#[derive(Clone, Debug, Default)]
pub struct MediaFilter {
    pub classifications: Option<Vec<Uuid>>,
    pub featured: Option<bool>,
}

/// Stores a new record after checking its category and cover
/// invariants.
pub async fn create(db: &dyn Db, payload: MediaPayload) -> Result<MediaRecord, BackendError> {
    let url = payload.url.trim().to_owned();

    if db.retrieve_category(&payload.category).await?.is_none() {
        return Err(BackendError::InvalidInput(format!(
            "category {} does not exist",
            payload.category
        )));
    }

    let media = NewMedia {
        kind: payload.kind,
        category_id: payload.category,
        album: payload.album,
        is_cover: payload.es_portada.unwrap_or(false),
        is_featured: payload.is_featured.unwrap_or(false),
        title: payload.title,
        name: payload.name,
        description: payload.description,
        url,
        thumbnail_url: payload.thumbnail,
        public_id: payload.public_id,
        resource_type: payload.resource_type,
        full_video_url: payload.full_video_url,
    };

    media.validate()?;

    db.insert_media(media).await
}

/// Applies a partial update, checking the cover invariants against the
/// resulting record.
pub async fn update(db: &dyn Db, id: &Uuid, patch: MediaPatch) -> Result<MediaRecord, BackendError> {
    let mut record = db.retrieve_media_item(id).await?.ok_or(BackendError::NotFound)?;

    patch.apply(&mut record);
    record.validate()?;

    db.update_media(record).await?.ok_or(BackendError::NotFound)
}

/// Deletes a record, or its whole album when asked to. A record that
/// shares its album with others is only deleted once the caller says
/// which of the two it means.
pub async fn delete(
    logger: Arc<Logger>,
    db: &dyn Db,
    host: &dyn MediaHost,
    id: &Uuid,
    scope: Option<DeleteScope>,
) -> Result<MediaDeletion, BackendError> {
    let record = db.retrieve_media_item(id).await?.ok_or(BackendError::NotFound)?;

    let album = match record.album.clone() {
        Some(album) => album,
        None => return delete_single(logger, db, host, record).await,
    };

    let members = db.retrieve_album_members(&album, None).await?;
    let others = members.iter().filter(|m| m.id != record.id).count();

    match scope {
        None if others > 0 => Err(BackendError::AlbumScopeRequired {
            id: record.id,
            album,
            others,
        }),
        Some(DeleteScope::Album) => {
            debug!(logger, "Deleting album through one of its members..."; "album" => &album, "members" => members.len());

            let cloudinary_deleted = albums::destroy_assets(logger, host, &members).await;
            let deleted = db.delete_album_members(&album, None).await?;

            Ok(MediaDeletion {
                deleted,
                cloudinary_deleted,
                album: Some(album),
            })
        }
        _ => delete_single(logger, db, host, record).await,
    }
}

async fn delete_single(
    logger: Arc<Logger>,
    db: &dyn Db,
    host: &dyn MediaHost,
    record: MediaRecord,
) -> Result<MediaDeletion, BackendError> {
    let cloudinary_deleted =
        albums::destroy_assets(logger, host, std::slice::from_ref(&record)).await;
    let deleted = db.delete_media(&record.id).await?;

    Ok(MediaDeletion {
        deleted: deleted as u64,
        cloudinary_deleted,
        album: record.album,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use futures::executor::block_on;
    use proptest::prelude::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::albums::cover::MAX_COVERS_PER_ALBUM;
    use crate::category::{Category, NewCategory};
    use crate::db::memory::MemoryDb;
    use crate::host::mock::MockHost;

    fn payload(category: Uuid, album: Option<&str>, cover: bool) -> MediaPayload {
        serde_json::from_value(serde_json::json!({
            "type": "photo",
            "category": category,
            "url": "https://example.com/a.jpg",
            "album": album,
            "esPortada": cover,
            "publicId": "portfolio/a",
        }))
        .unwrap()
    }

    async fn category(db: &MemoryDb) -> Category {
        db.insert_category(NewCategory {
            name: "Projects".to_owned(),
            kind: MediaKind::Photo,
            active: true,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn blank_albums_are_stored_as_absent() {
        let db = MemoryDb::new();
        let category = category(&db).await;

        let record = create(&db, payload(category.id, Some("  "), false)).await.unwrap();

        assert_eq!(record.album, None);
    }

    #[tokio::test]
    async fn covers_need_an_album() {
        let db = MemoryDb::new();
        let category = category(&db).await;

        let result = create(&db, payload(category.id, None, true)).await;
        assert!(matches!(result, Err(BackendError::CoverWithoutAlbum)));

        let record = create(&db, payload(category.id, None, false)).await.unwrap();
        let patch = MediaPatch {
            es_portada: Some(true),
            ..Default::default()
        };
        let result = update(&db, &record.id, patch).await;
        assert!(matches!(result, Err(BackendError::CoverWithoutAlbum)));
    }

    #[tokio::test]
    async fn blank_urls_are_rejected() {
        let db = MemoryDb::new();
        let category = category(&db).await;

        let mut blank = payload(category.id, Some("Tour"), false);
        blank.url = "   ".to_owned();

        let result = create(&db, blank).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));
        assert!(db.retrieve_media(MediaFilter::default()).await.unwrap().is_empty());
    }

    #[test]
    fn new_and_stored_records_share_their_checks() {
        let category = Uuid::new_v4();

        let cases = [
            (None, true, "https://example.com/a.jpg"),
            (Some("Tour"), true, "https://example.com/a.jpg"),
            (None, false, ""),
            (None, false, "https://example.com/a.jpg"),
        ];

        for &(album, cover, url) in cases.iter() {
            let media = NewMedia {
                kind: MediaKind::Photo,
                category_id: category,
                album: album.map(ToOwned::to_owned),
                is_cover: cover,
                is_featured: false,
                title: None,
                name: None,
                description: None,
                url: url.to_owned(),
                thumbnail_url: None,
                public_id: None,
                resource_type: None,
                full_video_url: None,
            };

            let stored = media
                .clone()
                .into_record(Uuid::new_v4(), Times::now())
                .validate()
                .is_ok();

            assert_eq!(media.validate().is_ok(), stored, "{:?} {} {:?}", album, cover, url);
        }
    }

    #[tokio::test]
    async fn third_cover_is_rejected() {
        let db = MemoryDb::new();
        let category = category(&db).await;

        create(&db, payload(category.id, Some("Tour"), true)).await.unwrap();
        create(&db, payload(category.id, Some("Tour"), true)).await.unwrap();

        let result = create(&db, payload(category.id, Some("Tour"), true)).await;
        assert!(matches!(result, Err(BackendError::CoverLimitReached { limit: 2 })));

        let plain = create(&db, payload(category.id, Some("Tour"), false)).await.unwrap();
        let patch = MediaPatch {
            es_portada: Some(true),
            ..Default::default()
        };
        let result = update(&db, &plain.id, patch).await;
        assert!(matches!(result, Err(BackendError::CoverLimitReached { .. })));

        let elsewhere = create(&db, payload(category.id, Some("Other"), true)).await.unwrap();
        let patch = MediaPatch {
            album: Some(Some("Tour".to_owned())),
            ..Default::default()
        };
        let result = update(&db, &elsewhere.id, patch).await;
        assert!(matches!(result, Err(BackendError::CoverLimitReached { .. })));
    }

    #[tokio::test]
    async fn updating_a_cover_keeps_its_slot() {
        let db = MemoryDb::new();
        let category = category(&db).await;

        let first = create(&db, payload(category.id, Some("Tour"), true)).await.unwrap();
        create(&db, payload(category.id, Some("Tour"), true)).await.unwrap();

        let patch = MediaPatch {
            title: Some(Some("Opening night".to_owned())),
            ..Default::default()
        };
        let updated = update(&db, &first.id, patch).await.unwrap();

        assert_eq!(updated.title.as_deref(), Some("Opening night"));
        assert!(updated.is_cover);
    }

    #[tokio::test]
    async fn shared_albums_need_a_scope() {
        let logger = Arc::new(log::discard_logger());
        let db = MemoryDb::new();
        let host = MockHost::new();
        let category = category(&db).await;

        let a = create(&db, payload(category.id, Some("Tour"), false)).await.unwrap();
        let b = create(&db, payload(category.id, Some("Tour"), false)).await.unwrap();
        let c = create(&db, payload(category.id, Some("Tour"), false)).await.unwrap();

        match delete(logger.clone(), &db, &host, &a.id, None).await {
            Err(BackendError::AlbumScopeRequired { others, .. }) => assert_eq!(others, 2),
            other => panic!("unexpected result {:?}", other),
        }

        let deletion = delete(logger.clone(), &db, &host, &a.id, Some(DeleteScope::Item))
            .await
            .unwrap();
        assert_eq!(deletion.deleted, 1);

        let deletion = delete(logger.clone(), &db, &host, &b.id, Some(DeleteScope::Album))
            .await
            .unwrap();
        assert_eq!(deletion.deleted, 2);
        assert_eq!(deletion.cloudinary_deleted, 2);
        assert!(db.retrieve_media_item(&c.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lone_members_are_deleted_without_a_scope() {
        let logger = Arc::new(log::discard_logger());
        let db = MemoryDb::new();
        let host = MockHost::new();
        let category = category(&db).await;

        let record = create(&db, payload(category.id, Some("Solo"), true)).await.unwrap();

        let deletion = delete(logger, &db, &host, &record.id, None).await.unwrap();

        assert_eq!(deletion.deleted, 1);
        assert_eq!(deletion.album.as_deref(), Some("Solo"));
        assert_eq!(host.destroyed().len(), 1);
    }

    #[test]
    fn external_assets_default_to_images() {
        let now = OffsetDateTime::now_utc();
        let record = NewMedia {
            kind: MediaKind::Video,
            category_id: Uuid::nil(),
            album: None,
            is_cover: false,
            is_featured: false,
            title: None,
            name: None,
            description: None,
            url: "https://example.com/v.mp4".to_owned(),
            thumbnail_url: None,
            public_id: Some("portfolio/v".to_owned()),
            resource_type: None,
            full_video_url: None,
        }
        .into_record(Uuid::nil(), Times::new(now, now));

        assert_eq!(
            record.external_asset(),
            Some(("portfolio/v", ExternalAssetKind::Image))
        );
    }

    #[derive(Clone, Debug)]
    enum Step {
        Create { album: Option<u8>, cover: bool },
        SetCover { target: usize, cover: bool },
        Move { target: usize, album: Option<u8> },
    }

    fn album_name(album: Option<u8>) -> Option<String> {
        album.map(|a| format!("album {}", a))
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (prop::option::of(0u8..3), any::<bool>())
                .prop_map(|(album, cover)| Step::Create { album, cover }),
            (0usize..16, any::<bool>())
                .prop_map(|(target, cover)| Step::SetCover { target, cover }),
            (0usize..16, prop::option::of(0u8..3))
                .prop_map(|(target, album)| Step::Move { target, album }),
        ]
    }

    proptest! {
        #[test]
        fn no_album_ever_has_more_than_two_covers(steps in prop::collection::vec(step(), 1..40)) {
            let db = MemoryDb::new();
            let category = block_on(category(&db));
            let mut ids = Vec::new();

            for step in steps {
                match step {
                    Step::Create { album, cover } => {
                        let mut payload = payload(category.id, None, cover);
                        payload.album = album_name(album);

                        if let Ok(record) = block_on(create(&db, payload)) {
                            ids.push(record.id);
                        }
                    }
                    Step::SetCover { target, cover } if !ids.is_empty() => {
                        let patch = MediaPatch {
                            es_portada: Some(cover),
                            ..Default::default()
                        };
                        let _ = block_on(update(&db, &ids[target % ids.len()], patch));
                    }
                    Step::Move { target, album } if !ids.is_empty() => {
                        let patch = MediaPatch {
                            album: Some(album_name(album)),
                            ..Default::default()
                        };
                        let _ = block_on(update(&db, &ids[target % ids.len()], patch));
                    }
                    _ => {}
                }

                let media = block_on(db.retrieve_media(MediaFilter::default())).unwrap();
                let mut covers: HashMap<String, usize> = HashMap::new();

                for record in media.iter().filter(|m| m.is_cover) {
                    prop_assert!(record.album.is_some(), "cover without album: {:?}", record);
                    *covers.entry(record.album.clone().unwrap_or_default()).or_default() += 1;
                }

                prop_assert!(
                    covers.values().all(|count| *count <= MAX_COVERS_PER_ALBUM),
                    "{:?}",
                    covers
                );
            }
        }
    }
}
