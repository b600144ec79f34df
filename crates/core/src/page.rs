//! Pagination

use serde::{Deserialize, Serialize};

/// Requested page (1-based); always within bounds, however it was built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPagination")]
pub struct Pagination {
    page: u32,
    per_page: u32,
}

/// Wire shape of [`Pagination`] before clamping
#[derive(Deserialize)]
struct RawPagination {
    page: u32,
    per_page: u32,
}

impl From<RawPagination> for Pagination {
    fn from(raw: RawPagination) -> Self {
        Pagination::new(raw.page, raw.per_page)
    }
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 200;

    /// Clamp to `page >= 1` and `1 <= per_page <= MAX_PER_PAGE`
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 || self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page))
    }
}
