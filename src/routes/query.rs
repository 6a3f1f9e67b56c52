use serde::Deserialize;

use crate::category::parse_flag;
use crate::errors::{parse_id, BackendError};
use crate::media::{DeleteScope, MediaFilter};

#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    pub category: Option<String>,
    pub featured: Option<String>,
}

impl MediaQuery {
    pub fn filter(&self) -> Result<MediaFilter, BackendError> {
        let classifications = match self.category.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(vec![parse_id(raw)?]),
            _ => None,
        };

        Ok(MediaFilter {
            classifications,
            featured: self.featured.as_deref().and_then(parse_flag),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub scope: Option<String>,
}

impl DeleteQuery {
    pub fn scope(&self) -> Result<Option<DeleteScope>, BackendError> {
        match self.scope.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some("item") => Ok(Some(DeleteScope::Item)),
            Some("album") => Ok(Some(DeleteScope::Album)),
            Some(other) => Err(BackendError::InvalidInput(format!(
                "unknown scope {:?}; use item or album",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_parsed_strictly() {
        let query = |scope: Option<&str>| DeleteQuery {
            scope: scope.map(str::to_owned),
        };

        assert_eq!(query(None).scope().unwrap(), None);
        assert_eq!(query(Some("album")).scope().unwrap(), Some(DeleteScope::Album));
        assert!(matches!(
            query(Some("everything")).scope(),
            Err(BackendError::InvalidInput(_))
        ));
    }

    #[test]
    fn media_filters_need_valid_ids() {
        let query = MediaQuery {
            category: Some("nope".to_owned()),
            featured: None,
        };

        assert!(matches!(query.filter(), Err(BackendError::InvalidId(_))));

        let query = MediaQuery {
            category: None,
            featured: Some("true".to_owned()),
        };
        let filter = query.filter().unwrap();

        assert_eq!(filter.classifications, None);
        assert_eq!(filter.featured, Some(true));
    }
}
