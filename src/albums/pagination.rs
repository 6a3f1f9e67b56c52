use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 6;
pub const MAX_LIMIT: u64 = 24;

/// Raw pagination parameters. Kept as strings so that garbage falls back
/// to the defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// A page number and size, both clamped to their valid ranges.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(DEFAULT_PAGE as i64, DEFAULT_LIMIT as i64)
    }
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        PageRequest {
            page: page.max(1) as u64,
            limit: limit.max(1).min(MAX_LIMIT as i64) as u64,
        }
    }

    pub fn from_query(query: &PageQuery) -> Self {
        fn parse(raw: Option<&String>, default: u64) -> i64 {
            raw.and_then(|r| r.trim().parse::<i64>().ok())
                .unwrap_or(default as i64)
        }

        PageRequest::new(
            parse(query.page.as_ref(), DEFAULT_PAGE),
            parse(query.limit.as_ref(), DEFAULT_LIMIT),
        )
    }

    /// How many items precede this page.
    pub fn offset(&self) -> usize {
        let offset = (self.page - 1).saturating_mul(self.limit);

        usize::try_from(offset).unwrap_or(usize::MAX)
    }

    pub fn total_pages(&self, total: usize) -> u64 {
        let total = total as u64;

        (total + self.limit - 1) / self.limit
    }

    /// The items on this page, taken from the fully sorted `items`.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(ToOwned::to_owned),
            limit: limit.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn missing_or_garbage_values_use_defaults() {
        assert_eq!(PageRequest::from_query(&query(None, None)), PageRequest { page: 1, limit: 6 });
        assert_eq!(
            PageRequest::from_query(&query(Some("abc"), Some("2.5"))),
            PageRequest { page: 1, limit: 6 }
        );
        assert_eq!(
            PageRequest::from_query(&query(Some("99999999999999999999999"), None)),
            PageRequest { page: 1, limit: 6 }
        );
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(
            PageRequest::from_query(&query(Some("0"), Some("100"))),
            PageRequest { page: 1, limit: 24 }
        );
        assert_eq!(
            PageRequest::from_query(&query(Some("-4"), Some("0"))),
            PageRequest { page: 1, limit: 1 }
        );
        assert_eq!(
            PageRequest::from_query(&query(Some(" 3 "), Some("10"))),
            PageRequest { page: 3, limit: 10 }
        );
    }

    #[test]
    fn pages_are_counted_and_sliced() {
        let request = PageRequest::new(2, 4);

        assert_eq!(request.total_pages(0), 0);
        assert_eq!(request.total_pages(8), 2);
        assert_eq!(request.total_pages(9), 3);
        assert_eq!(request.slice((0..10).collect::<Vec<i32>>()), vec![4, 5, 6, 7]);
        assert!(PageRequest::new(5, 4).slice((0..10).collect::<Vec<i32>>()).is_empty());
    }

    #[test]
    fn huge_pages_do_not_overflow() {
        let request = PageRequest::new(i64::MAX, MAX_LIMIT as i64);

        assert_eq!(request.offset(), usize::MAX);
        assert!(request.slice(vec![1, 2, 3]).is_empty());
    }
}
