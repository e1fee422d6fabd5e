//! Delivery drivers: paged listing and the analytics summary.

use crate::banner::DEFAULT_DISPLAY;
use crate::error::Result;
use crate::sequence::Settled;
use crate::slice::{DEFAULT_PAGE_LIMIT, ListSlice, ListView};
use crate::source::DriverBackend;
use crate::types::{DriverId, StoreId, define_open_enum};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

define_open_enum!(
    /// Driver availability.
    DriverStatus {
        Available => "available",
        Busy => "busy",
        Offline => "offline",
    }
);

/// Delivery driver as returned by `GET /driver/drivers`.
///
/// Optional fields are always written, `null` when unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: DriverStatus,
    #[serde(default)]
    pub store_id: Option<StoreId>,
    #[serde(default)]
    pub total_deliveries: Option<u32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query for the driver list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,
    pub page: u32,
    pub limit: u32,
}

impl Default for DriverQuery {
    fn default() -> Self {
        Self {
            store_id: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl DriverQuery {
    /// Returns `(key, value)` query parameters.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(store) = &self.store_id {
            pairs.push(("storeId", store.to_string()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

/// Aggregates shown on the driver analytics page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DriverStats {
    pub total: usize,
    pub by_status: BTreeMap<DriverStatus, usize>,
    pub total_deliveries: u64,
    /// Mean over drivers that have a rating.
    pub average_rating: Option<f64>,
}

impl DriverStats {
    /// Computes the aggregates for `drivers`.
    pub fn from_drivers(drivers: &[Driver]) -> Self {
        let mut stats = Self {
            total: drivers.len(),
            ..Self::default()
        };
        let mut rating_sum = 0.0;
        let mut rated = 0usize;
        for driver in drivers {
            *stats.by_status.entry(driver.status.clone()).or_default() += 1;
            stats.total_deliveries += u64::from(driver.total_deliveries.unwrap_or(0));
            if let Some(rating) = driver.rating.filter(|r| r.is_finite()) {
                rating_sum += rating;
                rated += 1;
            }
        }
        if rated > 0 {
            stats.average_rating = Some(rating_sum / rated as f64);
        }
        stats
    }

    /// Returns the number of drivers with `status`.
    pub fn count(&self, status: &DriverStatus) -> usize {
        self.by_status.get(status).copied().unwrap_or(0)
    }
}

/// Driver table state bound to a [`DriverBackend`].
#[derive(Debug)]
pub struct DriverSlice<B> {
    backend: B,
    list: ListSlice<Driver, DriverQuery>,
}

impl<B> DriverSlice<B>
where
    B: DriverBackend + Send + Sync,
{
    /// Creates a slice with an initial query.
    pub fn new(backend: B, query: DriverQuery) -> Self {
        Self::with_display(backend, query, DEFAULT_DISPLAY)
    }

    /// Creates a slice whose messages stay visible for `display`.
    pub fn with_display(backend: B, query: DriverQuery, display: Duration) -> Self {
        Self {
            backend,
            list: ListSlice::with_display(query, display),
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the current list state.
    pub fn view(&self) -> ListView<Driver, DriverQuery> {
        self.list.view()
    }

    /// Returns aggregates over the drivers on the current page.
    pub fn stats(&self) -> DriverStats {
        DriverStats::from_drivers(&self.list.view().items)
    }

    /// Refetches the current query.
    pub async fn fetch(&self) -> Result<Settled> {
        self.load(self.list.query()).await
    }

    /// Moves to `page`.
    pub async fn set_page(&self, page: u32) -> Result<Settled> {
        let mut query = self.list.query();
        query.page = page.max(1);
        self.load(query).await
    }

    /// Shows the drivers of `store`, starting from the first page.
    pub async fn set_store(&self, store: Option<StoreId>) -> Result<Settled> {
        let mut query = self.list.query();
        query.store_id = store;
        query.page = 1;
        self.load(query).await
    }

    async fn load(&self, query: DriverQuery) -> Result<Settled> {
        self.list
            .load(query, |query| self.backend.list_drivers(query))
            .await
    }
}
