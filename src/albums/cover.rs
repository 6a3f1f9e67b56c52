use crate::media::MediaRecord;

/// The most records in one album that may be marked as covers.
pub const MAX_COVERS_PER_ALBUM: usize = 2;

/// How many members a group shows as thumbnails.
pub const PREVIEW_SIZE: usize = 2;

/// Orders album members covers first, then newest first. Ties are
/// broken by id so the order is stable across reads.
pub fn cover_first(mut members: Vec<MediaRecord>) -> Vec<MediaRecord> {
    members.sort_by(|a, b| {
        b.is_cover
            .cmp(&a.is_cover)
            .then_with(|| b.times.created_at.cmp(&a.times.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    members
}

/// The leading members of an already ordered album.
pub fn preview(ordered: &[MediaRecord]) -> &[MediaRecord] {
    &ordered[..ordered.len().min(PREVIEW_SIZE)]
}

#[cfg(test)]
pub(crate) mod tests {
    use proptest::prelude::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::media::{MediaKind, MediaRecord};
    use crate::times::Times;

    pub(crate) fn record(id: u128, album: Option<&str>, cover: bool, created_at: i64) -> MediaRecord {
        let created_at = OffsetDateTime::from_unix_timestamp(created_at);

        MediaRecord {
            id: Uuid::from_u128(id),
            kind: MediaKind::Photo,
            category_id: Uuid::nil(),
            album: album.map(ToOwned::to_owned),
            is_cover: cover,
            is_featured: false,
            title: None,
            name: Some(format!("record {}", id)),
            description: None,
            url: format!("https://example.com/{}.jpg", id),
            thumbnail_url: None,
            public_id: Some(format!("portfolio/{}", id)),
            resource_type: None,
            full_video_url: None,
            times: Times::new(created_at, created_at),
        }
    }

    fn ids(records: &[MediaRecord]) -> Vec<u128> {
        records.iter().map(|r| r.id.as_u128()).collect()
    }

    #[test]
    fn covers_take_the_preview_slots() {
        let a = record(1, Some("Tour"), false, 1);
        let b = record(2, Some("Tour"), true, 2);
        let c = record(3, Some("Tour"), false, 3);

        let ordered = cover_first(vec![a, b, c]);

        assert_eq!(ids(&ordered), vec![2, 3, 1]);
        assert_eq!(ids(preview(&ordered)), vec![2, 3]);
    }

    #[test]
    fn without_covers_the_newest_comes_first() {
        let ordered = cover_first(vec![
            record(1, Some("Tour"), false, 10),
            record(2, Some("Tour"), false, 30),
            record(3, Some("Tour"), false, 20),
        ]);

        assert_eq!(ids(&ordered), vec![2, 3, 1]);
    }

    #[test]
    fn short_albums_preview_everything() {
        let ordered = cover_first(vec![record(1, Some("Tour"), false, 1)]);

        assert_eq!(preview(&ordered).len(), 1);
        assert!(preview(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn covers_are_never_bumped(members in prop::collection::vec((any::<bool>(), 0i64..1_000), 0..12)) {
            let records = members
                .iter()
                .enumerate()
                .map(|(i, (cover, created_at))| record(i as u128, Some("Tour"), *cover, *created_at))
                .collect::<Vec<_>>();

            let ordered = cover_first(records.clone());
            prop_assert_eq!(ordered.len(), records.len());

            let covers = ordered.iter().take_while(|r| r.is_cover).count();
            prop_assert_eq!(covers, records.iter().filter(|r| r.is_cover).count());

            for pair in ordered[covers..].windows(2) {
                prop_assert!(pair[0].times.created_at >= pair[1].times.created_at);
            }
        }
    }
}
