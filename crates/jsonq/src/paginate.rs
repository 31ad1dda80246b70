//! Page slicing with pagination metadata.

use serde::Serialize;

use crate::value::Value;

/// Pagination metadata for one page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Number of entries across all pages.
    pub total: usize,
    /// Page size.
    pub per_page: usize,
    /// The 1-based page number of this page.
    pub current_page: usize,
    /// The 1-based number of the last page; `0` when there are no entries.
    pub last_page: usize,
    /// 1-based index of the first entry on this page, `None` if the page is empty.
    pub from: Option<usize>,
    /// 1-based index of the last entry on this page, `None` if the page is empty.
    pub to: Option<usize>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// The entries on this page.
    pub data: Vec<Value>,
    /// Where this page sits in the full result.
    pub pagination: Pagination,
}

impl Page {
    /// Cuts page `page` (1-based) of size `per_page` out of `entries`.
    ///
    /// `page` and `per_page` are clamped to at least 1. A page past the end
    /// is empty but still reports the totals.
    pub fn slice(entries: Vec<Value>, page: usize, per_page: usize) -> Page {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = entries.len();
        let offset = (page - 1).saturating_mul(per_page);

        let data: Vec<Value> = entries.into_iter().skip(offset).take(per_page).collect();
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            (Some(offset + 1), Some(offset + data.len()))
        };

        Page {
            data,
            pagination: Pagination {
                total,
                per_page,
                current_page: page,
                last_page: total.div_ceil(per_page),
                from,
                to,
            },
        }
    }
}
