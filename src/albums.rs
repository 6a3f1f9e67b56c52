//! Groups project media into albums and deletes them.
//!
//! Groups are never stored: every read fetches the records of the
//! project categories and rebuilds them. Records without an album form a
//! group of their own under a synthetic key.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn, Logger};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::classification::resolve_projects;
use crate::db::Db;
use crate::errors::BackendError;
use crate::host::MediaHost;
use crate::media::{MediaFilter, MediaKind, MediaRecord};
use crate::normalization::normalize_text;

pub mod cover;
pub mod pagination;

use self::cover::{cover_first, preview};
use self::pagination::PageRequest;

/// Prefix of the keys given to records without an album.
pub const SINGLE_KEY_PREFIX: &str = "single:";

/// The parts of a member shown as a cover or preview.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlbumThumbnail {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub kind: MediaKind,

    pub url: String,
    pub thumbnail: Option<String>,

    #[serde(rename = "fullVideoUrl")]
    pub full_video_url: Option<String>,

    #[serde(rename = "esPortada")]
    pub is_cover: bool,
}

impl From<&MediaRecord> for AlbumThumbnail {
    fn from(record: &MediaRecord) -> Self {
        AlbumThumbnail {
            id: record.id,
            kind: record.kind,
            url: record.url.clone(),
            thumbnail: record.thumbnail_url.clone(),
            full_video_url: record.full_video_url.clone(),
            is_cover: record.is_cover,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumGroup {
    pub album_key: String,

    /// `None` for the singleton group of a record without an album.
    pub album: Option<String>,

    pub display_name: Option<String>,
    pub description: Option<String>,
    pub member_count: usize,
    pub has_video: bool,
    pub cover: AlbumThumbnail,
    pub preview_thumbnails: Vec<AlbumThumbnail>,

    #[serde(with = "time::serde::timestamp")]
    pub last_activity_at: OffsetDateTime,
}

impl AlbumGroup {
    /// Builds a group from its members, which must not be empty.
    fn new(album_key: String, members: Vec<MediaRecord>) -> Option<Self> {
        let ordered = cover_first(members);
        let first = ordered.first()?;

        Some(AlbumGroup {
            album: first.album.clone(),
            display_name: first.name.clone(),
            description: first.description.clone(),
            member_count: ordered.len(),
            has_video: ordered.iter().any(|m| m.kind == MediaKind::Video),
            cover: AlbumThumbnail::from(first),
            preview_thumbnails: preview(&ordered).iter().map(AlbumThumbnail::from).collect(),
            last_activity_at: ordered.iter().map(|m| m.times.created_at).max()?,
            album_key,
        })
    }
}

/// The key a record is grouped under.
pub fn group_key(record: &MediaRecord) -> String {
    match &record.album {
        Some(album) => album.clone(),
        None => format!("{}{}", SINGLE_KEY_PREFIX, record.id),
    }
}

/// Groups records by album key, most recently active group first.
pub fn group_albums(records: Vec<MediaRecord>) -> Vec<AlbumGroup> {
    let mut members: BTreeMap<String, Vec<MediaRecord>> = BTreeMap::new();

    for record in records {
        members.entry(group_key(&record)).or_default().push(record);
    }

    let mut groups = members
        .into_iter()
        .filter_map(|(key, members)| AlbumGroup::new(key, members))
        .collect::<Vec<_>>();

    groups.sort_by(|a, b| {
        b.last_activity_at
            .cmp(&a.last_activity_at)
            .then_with(|| a.album_key.cmp(&b.album_key))
    });

    groups
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumPage {
    pub page: u64,
    pub limit: u64,
    pub total: usize,
    pub total_pages: u64,
    pub projects: Vec<AlbumGroup>,
}

impl AlbumPage {
    fn empty(request: PageRequest) -> Self {
        AlbumPage {
            page: request.page,
            limit: request.limit,
            total: 0,
            total_pages: 0,
            projects: vec![],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlbumDetail {
    pub album: String,
    pub items: Vec<MediaRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDeletion {
    pub deleted: u64,
    pub cloudinary_deleted: usize,
    pub album: String,
}

/// Lists one page of project albums.
pub async fn list_albums(db: &dyn Db, request: PageRequest) -> Result<AlbumPage, BackendError> {
    let classifications = resolve_projects(db).await?;

    if classifications.is_empty() {
        return Ok(AlbumPage::empty(request));
    }

    let filter = MediaFilter {
        classifications: Some(classifications),
        featured: None,
    };
    let groups = group_albums(db.retrieve_media(filter).await?);
    let total = groups.len();

    Ok(AlbumPage {
        page: request.page,
        limit: request.limit,
        total,
        total_pages: request.total_pages(total),
        projects: request.slice(groups),
    })
}

/// Every member of one project album, covers first.
pub async fn album_detail(db: &dyn Db, album_key: &str) -> Result<AlbumDetail, BackendError> {
    let album = album_key_from(album_key)?;
    let classifications = resolve_projects(db).await?;

    if classifications.is_empty() {
        return Ok(AlbumDetail {
            album,
            items: vec![],
        });
    }

    let members = db
        .retrieve_album_members(&album, Some(classifications))
        .await?;

    Ok(AlbumDetail {
        album,
        items: cover_first(members),
    })
}

/// Deletes every member of one project album along with their hosted
/// files. Deleting an album that is already gone succeeds with a count
/// of zero.
pub async fn delete_album(
    logger: Arc<Logger>,
    db: &dyn Db,
    host: &dyn MediaHost,
    album_key: &str,
) -> Result<AlbumDeletion, BackendError> {
    let album = album_key_from(album_key)?;
    let classifications = resolve_projects(db).await?;

    if classifications.is_empty() {
        return Ok(AlbumDeletion {
            deleted: 0,
            cloudinary_deleted: 0,
            album,
        });
    }

    let members = db
        .retrieve_album_members(&album, Some(classifications.clone()))
        .await?;
    debug!(logger, "Deleting album..."; "album" => &album, "members" => members.len());

    let cloudinary_deleted = destroy_assets(logger, host, &members).await;
    let deleted = db
        .delete_album_members(&album, Some(classifications))
        .await?;

    Ok(AlbumDeletion {
        deleted,
        cloudinary_deleted,
        album,
    })
}

/// Asks the external host to delete the files behind `records`,
/// returning how many it confirmed. Failures are logged and skipped.
pub(crate) async fn destroy_assets(
    logger: Arc<Logger>,
    host: &dyn MediaHost,
    records: &[MediaRecord],
) -> usize {
    let mut destroyed = 0;

    for record in records {
        let (public_id, kind) = match record.external_asset() {
            Some(asset) => asset,
            None => continue,
        };

        match host.destroy(public_id, kind).await {
            Ok(()) => destroyed += 1,
            Err(e) => {
                warn!(logger, "Failed to delete hosted file"; "id" => %record.id, "public_id" => public_id, "error" => %e);
            }
        }
    }

    destroyed
}

fn album_key_from(raw: &str) -> Result<String, BackendError> {
    let album = normalize_text(raw);

    if album.is_empty() {
        Err(BackendError::InvalidInput("album must not be empty".to_owned()))
    } else {
        Ok(album)
    }
}
