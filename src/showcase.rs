//! Picks the media shown in the fixed sections of the public page.

use serde::Serialize;

use crate::category::{Category, CategoryFilter};
use crate::classification::find_named;
use crate::db::Db;
use crate::errors::BackendError;
use crate::media::{MediaFilter, MediaKind, MediaRecord};

pub const BANNER_CATEGORY: &str = "banner";
pub const CAROUSEL_CATEGORY: &str = "carousel";
pub const FOOTER_CATEGORY: &str = "footer";

/// The most items the footer shows.
pub const FOOTER_LIMIT: usize = 4;

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Showcase {
    pub banner: Option<MediaRecord>,
    pub carousel: Vec<MediaRecord>,
    pub footer: Vec<MediaRecord>,
}

/// Builds the showcase from all categories and all media, the latter
/// listed covers first, then newest first.
pub fn select(categories: &[Category], media: &[MediaRecord]) -> Showcase {
    let section = |name: &str| -> Vec<MediaRecord> {
        match find_named(categories, name) {
            Some(category) => media
                .iter()
                .filter(|m| m.category_id == category.id)
                .cloned()
                .collect(),
            None => vec![],
        }
    };

    let banner = featured_first(section(BANNER_CATEGORY)).into_iter().next();

    let carousel = section(CAROUSEL_CATEGORY)
        .into_iter()
        .filter(|m| m.kind == MediaKind::Photo)
        .collect();

    let mut footer = featured_first(section(FOOTER_CATEGORY));
    footer.truncate(FOOTER_LIMIT);

    Showcase {
        banner,
        carousel,
        footer,
    }
}

pub async fn showcase(db: &dyn Db) -> Result<Showcase, BackendError> {
    let categories = db.retrieve_categories(CategoryFilter::active()).await?;
    let media = db.retrieve_media(MediaFilter::default()).await?;

    Ok(select(&categories, &media))
}

/// Moves featured items to the front, keeping the order otherwise.
fn featured_first(mut items: Vec<MediaRecord>) -> Vec<MediaRecord> {
    items.sort_by(|a, b| b.is_featured.cmp(&a.is_featured));

    items
}
