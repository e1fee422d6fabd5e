//! Order list, filters, drafts and the order slice.

use crate::banner::DEFAULT_DISPLAY;
use crate::error::{Error, Result, SourceError};
use crate::sequence::Settled;
use crate::slice::{DEFAULT_PAGE_LIMIT, ListSlice, ListView};
use crate::source::OrderBackend;
use crate::types::{DriverId, OrderId, StoreId, define_open_enum};
use crate::validation::FieldErrors;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

define_open_enum!(
    /// Order lifecycle status.
    OrderStatus {
        Pending => "pending",
        Validated => "validated",
        Preparing => "preparing",
        InDelivery => "in_delivery",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
);

define_open_enum!(
    /// How the customer pays.
    PaymentType {
        Cash => "cash",
        Card => "card",
        Online => "online",
    }
);

/// Order as returned by the API.
///
/// Fields the client does not model are kept in `extra` and written back
/// unchanged. Optional fields are always written, `null` when unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub payment_type: PaymentType,
    pub payment_amount: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    /// Returns whether `needle` occurs in the id, customer name or phone.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            self.id.as_str(),
            self.customer_name.as_str(),
            self.customer_phone.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// List query for the order table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,
    pub page: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<PaymentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            store_id: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            status: None,
            payment_type: None,
            search: None,
        }
    }
}

impl OrderFilter {
    /// Creates the first-page filter for a store.
    pub fn for_store(store: StoreId) -> Self {
        Self {
            store_id: Some(store),
            ..Self::default()
        }
    }

    /// Returns whether `order` passes every set criterion.
    pub fn matches(&self, order: &Order) -> bool {
        self.store_id
            .as_ref()
            .is_none_or(|store| &order.store_id == store)
            && self
                .status
                .as_ref()
                .is_none_or(|status| &order.status == status)
            && self
                .payment_type
                .as_ref()
                .is_none_or(|payment| &order.payment_type == payment)
            && self
                .search
                .as_deref()
                .is_none_or(|needle| order.matches_search(needle))
    }

    /// Returns `(key, value)` query parameters for the set criteria.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(store) = &self.store_id {
            pairs.push(("storeId", store.to_string()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(payment) = &self.payment_type {
            pairs.push(("paymentType", payment.as_str().to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        pairs
    }
}

/// Editable order fields, as typed into the order form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub store_id: Option<StoreId>,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub payment_type: Option<PaymentType>,
    pub payment_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderDraft {
    /// Fills a draft from an existing order for editing.
    pub fn from_order(order: &Order) -> Self {
        Self {
            store_id: Some(order.store_id.clone()),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            delivery_address: order.delivery_address.clone(),
            payment_type: Some(order.payment_type.clone()),
            payment_amount: Some(order.payment_amount),
            driver_id: order.driver_id.clone(),
            notes: order.notes.clone(),
        }
    }

    /// Checks required fields and the payment amount.
    pub fn validate(&self) -> std::result::Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.store_id.is_none() {
            errors.add("storeId", "Store is required");
        }
        errors.require("customerName", "Customer name", &self.customer_name);
        errors.require("customerPhone", "Customer phone", &self.customer_phone);
        errors.require("deliveryAddress", "Delivery address", &self.delivery_address);
        if self.payment_type.is_none() {
            errors.add("paymentType", "Payment type is required");
        }
        match self.payment_amount {
            None => errors.add("paymentAmount", "Payment amount is required"),
            Some(amount) if !amount.is_finite() || amount <= 0.0 => {
                errors.add("paymentAmount", "Payment amount must be greater than 0");
            }
            Some(_) => {}
        }
        errors.into_result()
    }
}

/// Order table state bound to an [`OrderBackend`].
///
/// Mutations never patch the cached list; each successful mutation is
/// followed by a refetch with the current filter.
#[derive(Debug)]
pub struct OrderSlice<B> {
    backend: B,
    list: ListSlice<Order, OrderFilter>,
}

impl<B> OrderSlice<B>
where
    B: OrderBackend + Send + Sync,
{
    /// Creates a slice with an initial filter.
    pub fn new(backend: B, filter: OrderFilter) -> Self {
        Self::with_display(backend, filter, DEFAULT_DISPLAY)
    }

    /// Creates a slice whose messages stay visible for `display`.
    pub fn with_display(backend: B, filter: OrderFilter, display: Duration) -> Self {
        Self {
            backend,
            list: ListSlice::with_display(filter, display),
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the current list state.
    pub fn view(&self) -> ListView<Order, OrderFilter> {
        self.list.view()
    }

    /// Returns the current filter.
    pub fn filter(&self) -> OrderFilter {
        self.list.query()
    }

    /// Refetches the current filter.
    pub async fn fetch(&self) -> Result<Settled> {
        self.load(self.list.query()).await
    }

    /// Applies a new filter, starting again from the first page.
    pub async fn set_filter(&self, mut filter: OrderFilter) -> Result<Settled> {
        filter.page = 1;
        self.load(filter).await
    }

    /// Moves to `page` of the current filter.
    pub async fn set_page(&self, page: u32) -> Result<Settled> {
        let mut filter = self.list.query();
        filter.page = page.max(1);
        self.load(filter).await
    }

    async fn load(&self, filter: OrderFilter) -> Result<Settled> {
        self.list
            .load(filter, |filter| self.backend.list_orders(filter))
            .await
    }

    /// Validates `draft` locally, then creates the order.
    pub async fn create(&self, draft: &OrderDraft) -> Result<Order> {
        draft.validate()?;
        let order = self
            .backend
            .create_order(draft.clone())
            .await
            .map_err(|err| self.fail("create order", err))?;
        self.refetch().await;
        Ok(order)
    }

    /// Validates `draft` locally, then updates order `id`.
    pub async fn update(&self, id: &OrderId, draft: &OrderDraft) -> Result<Order> {
        draft.validate()?;
        let order = self
            .backend
            .update_order(id.clone(), draft.clone())
            .await
            .map_err(|err| self.fail("update order", err))?;
        self.refetch().await;
        Ok(order)
    }

    /// Deletes order `id`.
    pub async fn delete(&self, id: &OrderId) -> Result<()> {
        self.backend
            .delete_order(id.clone())
            .await
            .map_err(|err| self.fail("delete order", err))?;
        self.refetch().await;
        Ok(())
    }

    /// Marks order `id` as validated on the server.
    pub async fn validate(&self, id: &OrderId) -> Result<Order> {
        let order = self
            .backend
            .validate_order(id.clone())
            .await
            .map_err(|err| self.fail("validate order", err))?;
        self.refetch().await;
        Ok(order)
    }

    /// Looks up an order by id; a missing order shows a notice.
    pub async fn find(&self, id: &OrderId) -> Result<Option<Order>> {
        let found = self
            .backend
            .get_order(id.clone())
            .await
            .map_err(|err| self.fail("find order", err))?;
        if found.is_none() {
            self.list.notify(format!("Order {id} not found"));
        }
        Ok(found)
    }

    async fn refetch(&self) {
        if let Err(err) = self.fetch().await {
            tracing::warn!(error = %err, "order refetch after mutation failed");
        }
    }

    fn fail(&self, operation: &str, err: SourceError) -> Error {
        tracing::warn!(operation, error = %err, "order request failed");
        self.list.report_error(format!("Failed to {operation}: {err}"));
        Error::Source(err)
    }
}
