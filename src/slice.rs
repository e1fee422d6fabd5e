use crate::banner::{Banner, DEFAULT_DISPLAY};
use crate::error::{Error, Result, SourceError};
use crate::sequence::{RequestSequence, Settled};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default page size for paginated lists.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// One page of a server-side list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Wraps an unpaginated list as a single page.
    pub fn single(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Self {
            limit: u32::try_from(items.len()).unwrap_or(u32::MAX),
            items,
            page: 1,
            total,
            total_pages: 1,
        }
    }

    /// Slices `items` into page `page` (1-based) of `limit` entries.
    pub fn paginate(items: Vec<T>, page: u32, limit: u32) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total = items.len() as u64;
        let total_pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX);
        let start = (page as usize - 1).saturating_mul(limit as usize);
        let items = items.into_iter().skip(start).take(limit as usize).collect();
        Self {
            items,
            page,
            limit,
            total,
            total_pages,
        }
    }

    /// Returns the pagination metadata.
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Pagination metadata of the last committed page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Returns whether a later page exists.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Returns whether an earlier page exists.
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Point-in-time copy of a list slice.
#[derive(Clone, Debug)]
pub struct ListView<T, Q> {
    pub query: Q,
    pub items: Vec<T>,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Debug)]
struct ListState<T, Q> {
    query: Q,
    items: Vec<T>,
    pagination: Pagination,
    loading: bool,
    error: Banner,
    notice: Banner,
    sequence: RequestSequence,
}

/// Request-cache state for one server-side list.
///
/// Every fetch takes a ticket; only the most recently issued fetch may
/// commit items, so a burst of query changes settles on the last query.
#[derive(Debug)]
pub struct ListSlice<T, Q> {
    state: RwLock<ListState<T, Q>>,
}

impl<T, Q> ListSlice<T, Q>
where
    T: Clone,
    Q: Clone,
{
    /// Creates an empty slice with an initial query.
    pub fn new(query: Q) -> Self {
        Self::with_display(query, DEFAULT_DISPLAY)
    }

    /// Creates an empty slice whose messages stay visible for `display`.
    pub fn with_display(query: Q, display: Duration) -> Self {
        Self {
            state: RwLock::new(ListState {
                query,
                items: Vec::new(),
                pagination: Pagination::default(),
                loading: false,
                error: Banner::new(display),
                notice: Banner::new(display),
                sequence: RequestSequence::new(),
            }),
        }
    }

    /// Returns the query of the most recently issued fetch.
    pub fn query(&self) -> Q {
        self.state.read().expect("poisoned lock").query.clone()
    }

    /// Returns the current state.
    pub fn view(&self) -> ListView<T, Q> {
        self.view_at(Instant::now())
    }

    /// Returns the state with messages evaluated at `now`.
    pub fn view_at(&self, now: Instant) -> ListView<T, Q> {
        let guard = self.state.read().expect("poisoned lock");
        ListView {
            query: guard.query.clone(),
            items: guard.items.clone(),
            pagination: guard.pagination,
            loading: guard.loading,
            error: guard.error.current_at(now).map(str::to_string),
            notice: guard.notice.current_at(now).map(str::to_string),
        }
    }

    /// Issues a fetch for `query` and commits its page if still current.
    ///
    /// A failed fetch leaves the previous items in place and shows the
    /// error message.
    pub async fn load<F, Fut>(&self, query: Q, fetch: F) -> Result<Settled>
    where
        F: FnOnce(Q) -> Fut,
        Fut: Future<Output = std::result::Result<Page<T>, SourceError>>,
    {
        let ticket = {
            let mut guard = self.state.write().expect("poisoned lock");
            guard.query = query.clone();
            guard.loading = true;
            guard.sequence.issue()
        };

        let result = fetch(query).await;

        let mut guard = self.state.write().expect("poisoned lock");
        if !guard.sequence.is_current(ticket) {
            tracing::debug!(ticket = ticket.get(), "discarding superseded list result");
            return Ok(Settled::Superseded);
        }
        guard.loading = false;
        match result {
            Ok(page) => {
                guard.pagination = page.pagination();
                guard.items = page.items;
                Ok(Settled::Committed)
            }
            Err(err) => {
                tracing::warn!(error = %err, "list fetch failed");
                guard.error.set(err.to_string(), Instant::now());
                Err(Error::Source(err))
            }
        }
    }

    /// Shows an error message, e.g. from a failed mutation.
    pub fn report_error(&self, message: impl Into<String>) {
        let mut guard = self.state.write().expect("poisoned lock");
        guard.error.set(message, Instant::now());
    }

    /// Shows a transient, non-error notice.
    pub fn notify(&self, message: impl Into<String>) {
        let mut guard = self.state.write().expect("poisoned lock");
        guard.notice.set(message, Instant::now());
    }

    /// Hides the error message.
    pub fn clear_error(&self) {
        self.state.write().expect("poisoned lock").error.clear();
    }
}
