use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

/// Filters accepted by the authenticated course listing.
///
/// A price bound of `0` is treated the same as an absent bound.
#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, Validate)]
pub struct CourseFilter {
    /// Minimum price (inclusive)
    #[validate(range(min = 0))]
    pub price_gte: Option<i64>,
    /// Maximum price (inclusive)
    #[validate(range(min = 0))]
    pub price_lte: Option<i64>,
    /// Created at or after (e.g. 2024-01-31T00:00:00)
    pub created_gte: Option<NaiveDateTime>,
    /// Created at or before
    pub created_lte: Option<NaiveDateTime>,
    /// Case-insensitive match on name or description
    pub search: Option<String>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<u64>,
}

impl CourseFilter {
    pub fn min_price(&self) -> Option<i64> {
        self.price_gte.filter(|p| *p != 0)
    }

    pub fn max_price(&self) -> Option<i64> {
        self.price_lte.filter(|p| *p != 0)
    }

    /// Trimmed search term, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_price_means_unbounded() {
        let filter = CourseFilter {
            price_gte: Some(0),
            price_lte: Some(200000),
            ..Default::default()
        };
        assert_eq!(filter.min_price(), None);
        assert_eq!(filter.max_price(), Some(200000));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = CourseFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_term(), None);

        let filter = CourseFilter {
            search: Some(" django ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_term(), Some("django"));
    }
}
