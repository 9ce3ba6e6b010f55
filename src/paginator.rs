//! Fixed-size pagination over a working set
//!
//! Tracks the current page and derives the page-control metadata the table
//! renderer draws: previous/next buttons and a window of at most
//! [`MAX_VISIBLE_PAGES`] numbered buttons with edge affordances.

use serde::Serialize;
use std::ops::Range;

/// Records per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Numbered buttons shown at once
pub const MAX_VISIBLE_PAGES: usize = 5;

/// Current-page cursor over a working set of known length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    current: usize,
}

/// `Showing start-end of total records`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

impl PageInfo {
    pub fn summary(&self) -> String {
        format!("Showing {}-{} of {} records", self.start, self.end, self.total)
    }
}

/// Previous or next button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavButton {
    pub target: usize,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PageControl {
    Page { number: usize, active: bool },
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationControls {
    pub previous: NavButton,
    pub pages: Vec<PageControl>,
    pub next: NavButton,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    /// Create a paginator positioned on page 1. A zero page size is treated as 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// `ceil(len / page_size)`; 0 for an empty working set
    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size)
    }

    /// Back to page 1, used whenever a new working set is produced
    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// Move to `page` if it lies in `[1, total_pages]`.
    ///
    /// Returns `false` and leaves the current page untouched otherwise.
    pub fn go_to(&mut self, page: usize, len: usize) -> bool {
        if page < 1 || page > self.total_pages(len) {
            return false;
        }
        self.current = page;
        true
    }

    /// Index range of the current page within a working set of `len`
    pub fn bounds(&self, len: usize) -> Range<usize> {
        let start = ((self.current - 1) * self.page_size).min(len);
        let end = (self.current * self.page_size).min(len);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.bounds(items.len())]
    }

    pub fn info(&self, len: usize) -> Option<PageInfo> {
        if len == 0 {
            return None;
        }
        let bounds = self.bounds(len);
        Some(PageInfo {
            start: bounds.start + 1,
            end: bounds.end,
            total: len,
        })
    }

    /// Page controls, or `None` when everything fits on one page
    pub fn controls(&self, len: usize) -> Option<PaginationControls> {
        let total = self.total_pages(len);
        if total <= 1 {
            return None;
        }

        let (first, last) = self.window(total);
        let mut pages = Vec::with_capacity(MAX_VISIBLE_PAGES + 4);

        if first > 1 {
            pages.push(PageControl::Page {
                number: 1,
                active: false,
            });
            if first > 2 {
                pages.push(PageControl::Ellipsis);
            }
        }

        for number in first..=last {
            pages.push(PageControl::Page {
                number,
                active: number == self.current,
            });
        }

        if last < total {
            if last < total - 1 {
                pages.push(PageControl::Ellipsis);
            }
            pages.push(PageControl::Page {
                number: total,
                active: false,
            });
        }

        Some(PaginationControls {
            previous: NavButton {
                target: self.current.saturating_sub(1),
                disabled: self.current == 1,
            },
            pages,
            next: NavButton {
                target: self.current + 1,
                disabled: self.current == total,
            },
        })
    }

    /// First and last numbered button, centred on the current page
    fn window(&self, total: usize) -> (usize, usize) {
        let mut first = self.current.saturating_sub(MAX_VISIBLE_PAGES / 2).max(1);
        let last = (first + MAX_VISIBLE_PAGES - 1).min(total);
        if last - first + 1 < MAX_VISIBLE_PAGES {
            first = (last + 1).saturating_sub(MAX_VISIBLE_PAGES).max(1);
        }
        (first, last)
    }
}
