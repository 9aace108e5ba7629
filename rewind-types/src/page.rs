//! Pagination envelope shared by every list endpoint.

use serde::{Deserialize, Serialize};

/// Default page number for list queries (1-based).
pub const DEFAULT_PAGE: u64 = 1;

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: u64 = 5;

/// One page of results plus the bookkeeping a client needs to page further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub payload: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PaginatedResponse<T> {
    #[must_use]
    pub fn new(payload: Vec<T>, meta: PageMeta) -> Self {
        Self { payload, meta }
    }

    /// An empty page carrying the given meta, used when a query
    /// short-circuits without fetching rows.
    #[must_use]
    pub fn empty(meta: PageMeta) -> Self {
        Self {
            payload: Vec::new(),
            meta,
        }
    }
}

/// Page bookkeeping. `total` counts every matching row, not just this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub total: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl PageMeta {
    /// Builds meta for a page. `page` and `page_size` must already be
    /// normalized to >= 1; `total_pages` rounds up.
    #[must_use]
    pub fn new(page: u64, page_size: u64, total: u64) -> Self {
        Self {
            page,
            total,
            page_size,
            total_pages: total.div_ceil(page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(PageMeta::new(1, 5, 0).total_pages, 0);
        assert_eq!(PageMeta::new(1, 5, 5).total_pages, 1);
        assert_eq!(PageMeta::new(1, 5, 6).total_pages, 2);
        assert_eq!(PageMeta::new(1, 5, 11).total_pages, 3);
    }

    #[test]
    fn serializes_in_camel_case() {
        let meta = PageMeta::new(2, 5, 12);
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "page": 2,
                "total": 12,
                "pageSize": 5,
                "totalPages": 3,
            })
        );
    }

    #[test]
    fn empty_page_keeps_the_meta() {
        let page: PaginatedResponse<String> = PaginatedResponse::empty(PageMeta::new(1, 5, 3));
        assert!(page.payload.is_empty());
        assert_eq!(page.meta.total, 3);
    }
}
