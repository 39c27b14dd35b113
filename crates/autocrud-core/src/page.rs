// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Paginated responses.

use serde::Serialize;

/// One page of a list response.
///
/// # Example
///
/// ```rust
/// use autocrud_core::Page;
///
/// let page = Page::new(3, 10, 25, vec!["u", "v", "w", "x", "y"]);
/// assert_eq!(page.total_pages, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// 1-based page number.
    pub page: u64,

    /// Requested page size.
    pub size: u64,

    /// Number of pages for the whole result set.
    pub total_pages: u64,

    /// Items on this page.
    pub page_data: Vec<T>
}

impl<T> Page<T> {
    /// Page `page` of `count` items split into pages of `size`.
    pub fn new(page: u64, size: u64, count: u64, page_data: Vec<T>) -> Self {
        Self {
            page,
            size,
            total_pages: total_pages(count, size),
            page_data
        }
    }

    /// Transform every item.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            page:        self.page,
            size:        self.size,
            total_pages: self.total_pages,
            page_data:   self.page_data.into_iter().map(f).collect()
        }
    }
}

/// `ceil(count / size)`; zero for an empty set or a zero size.
pub const fn total_pages(count: u64, size: u64) -> u64 {
    if size == 0 {
        return 0;
    }
    count / size + (count % size > 0) as u64
}

/// Offset of the first row of `page`.
pub const fn offset(page: u64, size: u64) -> u64 {
    size.saturating_mul(page.saturating_sub(1))
}
