//! Shared pagination types for API query parameters.
//!
//! List endpoints use offset-based pagination with `skip` and `limit`. Each endpoint picks
//! its own default page size; the maximum is shared.

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default page size for template listings.
pub const DEFAULT_TEMPLATE_LIMIT: i64 = 20;

/// Default page size for the game directory.
pub const DEFAULT_GAME_LIMIT: i64 = 100;

/// Default number of recent deep links returned.
pub const DEFAULT_DEEPLINK_LIMIT: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Standard pagination parameters for list endpoints.
///
/// The `limit` is clamped to `1..=MAX_LIMIT`, preventing both zero-result queries and
/// excessive data fetching. Values arrive as strings when the struct is flattened into a
/// larger query type, hence `DisplayFromStr`.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (max: 100)
    #[param(minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
        }
    }

    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    #[inline]
    pub fn limit_or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Pagination::default();
        assert_eq!(p.skip(), 0);
        assert_eq!(p.limit_or(DEFAULT_TEMPLATE_LIMIT), 20);
        assert_eq!(p.limit_or(DEFAULT_GAME_LIMIT), 100);
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(Pagination::new(0, 0).limit_or(DEFAULT_TEMPLATE_LIMIT), 1);
        assert_eq!(Pagination::new(0, 1000).limit_or(DEFAULT_TEMPLATE_LIMIT), MAX_LIMIT);
        assert_eq!(Pagination::new(0, 50).limit_or(DEFAULT_TEMPLATE_LIMIT), 50);
    }

    #[test]
    fn test_negative_skip_is_clamped() {
        assert_eq!(Pagination::new(-10, 5).skip(), 0);
    }

    #[test]
    fn test_parses_from_query_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(flatten)]
            pagination: Pagination,
        }

        let w: Wrapper = serde_json::from_value(serde_json::json!({"skip": "5", "limit": "7"})).unwrap();
        assert_eq!(w.pagination.skip(), 5);
        assert_eq!(w.pagination.limit_or(DEFAULT_TEMPLATE_LIMIT), 7);
    }
}
