//! Paged listing driver
//!
//! Drives a `(p, ps)` endpoint until one of:
//! - the accumulated count reaches the server-reported `total`
//! - a page comes back empty or short (the server's `total` is not trusted)
//! - the caller's page ceiling is reached
//! - a page request fails
//!
//! None of these is an error for the caller: whatever was accumulated is
//! returned, with the stop reason and the failure (if any) alongside.

use crate::api::{ApiError, ApiResult};
use tracing::{debug, warn};

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total reported by the server for the whole listing
    pub total: u64,
}

/// Page size and hard page-count ceiling for one endpoint family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: u64,
    pub max_pages: u32,
}

impl PageLimits {
    pub const fn new(page_size: u64, max_pages: u32) -> Self {
        Self {
            page_size,
            max_pages,
        }
    }

    /// Most items this listing can ever return
    pub fn capacity(&self) -> u64 {
        self.page_size * u64::from(self.max_pages.max(1))
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Accumulated count reached the reported total
    Exhausted,
    /// A page returned no items
    EmptyPage,
    /// A page returned fewer items than requested
    ShortPage,
    /// The page ceiling was reached with items still outstanding
    Ceiling,
    /// A page request failed
    Failed,
}

#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pages_fetched: u32,
    pub stop: StopReason,
    /// Last total reported by the server
    pub reported_total: u64,
    /// Set when `stop == StopReason::Failed`
    pub error: Option<ApiError>,
}

impl<T> Paginated<T> {
    pub fn is_complete(&self) -> bool {
        matches!(
            self.stop,
            StopReason::Exhausted | StopReason::EmptyPage | StopReason::ShortPage
        )
    }
}

/// Accumulate pages from `fetch(page_number, page_size)`, starting at page 1.
pub fn paginate<T, F>(limits: PageLimits, mut fetch: F) -> Paginated<T>
where
    F: FnMut(u32, u64) -> ApiResult<Page<T>>,
{
    let max_pages = limits.max_pages.max(1);
    let mut items: Vec<T> = Vec::new();
    let mut pages_fetched = 0u32;
    let mut reported_total = 0u64;
    let mut page = 1u32;

    let stop = loop {
        let result = match fetch(page, limits.page_size) {
            Ok(result) => result,
            Err(e) => {
                warn!("Page {} failed, keeping {} items: {}", page, items.len(), e);
                return Paginated {
                    items,
                    pages_fetched,
                    stop: StopReason::Failed,
                    reported_total,
                    error: Some(e),
                };
            }
        };
        pages_fetched += 1;
        reported_total = result.total;

        let returned = result.items.len() as u64;
        let room = reported_total.saturating_sub(items.len() as u64) as usize;
        items.extend(result.items.into_iter().take(room));

        if items.len() as u64 >= reported_total {
            break StopReason::Exhausted;
        }
        if returned == 0 {
            break StopReason::EmptyPage;
        }
        if returned < limits.page_size {
            break StopReason::ShortPage;
        }
        if page >= max_pages {
            debug!(
                "Page ceiling {} reached with {}/{} items",
                max_pages,
                items.len(),
                reported_total
            );
            break StopReason::Ceiling;
        }
        page += 1;
    };

    Paginated {
        items,
        pages_fetched,
        stop,
        reported_total,
        error: None,
    }
}
