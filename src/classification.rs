//! Resolves which categories hold project albums, and finds the named
//! categories that feed the public page.

use uuid::Uuid;

use crate::category::{Category, CategoryFilter};
use crate::db::Db;
use crate::errors::BackendError;

/// Category names (compared case-insensitively) whose media form the
/// project albums.
pub const PROJECT_CLASSIFICATION_NAMES: &[&str] = &["project", "projects"];

/// Whether `category` is called `name`, ignoring case and surrounding
/// whitespace.
pub fn matches_name(category: &Category, name: &str) -> bool {
    category.name.trim().to_lowercase() == name.trim().to_lowercase()
}

pub fn is_project_name(name: &str) -> bool {
    let name = name.trim().to_lowercase();

    PROJECT_CLASSIFICATION_NAMES.iter().any(|n| *n == name)
}

/// The ids of the active project categories among `categories`.
pub fn project_classification_ids(categories: &[Category]) -> Vec<Uuid> {
    categories
        .iter()
        .filter(|c| c.active && is_project_name(&c.name))
        .map(|c| c.id)
        .collect()
}

/// The first active category called `name`.
pub fn find_named<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    categories.iter().find(|c| c.active && matches_name(c, name))
}

/// Looks up the active project categories. An empty result means there
/// are no projects to show.
pub async fn resolve_projects(db: &dyn Db) -> Result<Vec<Uuid>, BackendError> {
    let categories = db.retrieve_categories(CategoryFilter::active()).await?;

    Ok(project_classification_ids(&categories))
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::media::MediaKind;
    use crate::times::Times;

    fn category(name: &str, active: bool) -> Category {
        let now = OffsetDateTime::now_utc();

        Category {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            kind: MediaKind::Photo,
            active,
            times: Times::new(now, now),
        }
    }

    #[test]
    fn project_names_ignore_case() {
        for name in &["project", "Projects", " PROJECTS ", "Project"] {
            assert!(is_project_name(name), "{:?} names projects", name);
        }

        for name in &["", "projectss", "my projects", "banner"] {
            assert!(!is_project_name(name), "{:?} does not name projects", name);
        }
    }

    #[test]
    fn inactive_categories_are_skipped() {
        let active = category("Projects", true);
        let inactive = category("project", false);
        let other = category("Banner", true);

        let ids = project_classification_ids(&[active.clone(), inactive, other]);

        assert_eq!(ids, vec![active.id]);
    }

    #[test]
    fn no_matching_categories_means_no_projects() {
        assert!(project_classification_ids(&[category("Carousel", true)]).is_empty());
        assert!(project_classification_ids(&[]).is_empty());
    }

    #[test]
    fn named_categories_are_found_when_active() {
        let categories = vec![category("Footer", false), category(" footer", true)];

        let found = find_named(&categories, "FOOTER").unwrap();

        assert_eq!(found.id, categories[1].id);
        assert!(find_named(&categories, "banner").is_none());
    }
}
