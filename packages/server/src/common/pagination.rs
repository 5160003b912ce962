//! Offset pagination for list endpoints.

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 25;
const MAX_LIMIT: i64 = 100;

/// Raw pagination arguments as they arrive in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationArgs {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Validated and normalized pagination arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PaginationArgs {
    /// Apply defaults (25) and bounds (1-100); negative offsets are rejected.
    pub fn validate(&self) -> Result<Page, &'static str> {
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err("offset must not be negative");
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        Ok(Page { limit, offset })
    }
}
