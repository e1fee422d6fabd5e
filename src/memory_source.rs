use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Map;

use crate::drivers::{Driver, DriverQuery};
use crate::error::SourceError;
use crate::orders::{Order, OrderDraft, OrderFilter, OrderStatus};
use crate::permission::RawPermission;
use crate::slice::Page;
use crate::source::{DriverBackend, OrderBackend, PermissionSource, ProfileSource, StoreBackend};
use crate::stores::{Store, StoreDraft};
use crate::types::{OrderId, StoreId, UserProfile};

/// In-memory backend implementation for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    profile: RwLock<Option<UserProfile>>,
    permissions: RwLock<Vec<RawPermission>>,
    orders: RwLock<BTreeMap<OrderId, Order>>,
    stores: RwLock<BTreeMap<StoreId, Store>>,
    drivers: RwLock<Vec<Driver>>,
    unavailable: AtomicBool,
    next_id: AtomicU64,
    permission_requests: AtomicU64,
    cache_clears: AtomicU64,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the profile returned for the current session.
    pub fn set_profile(&self, profile: UserProfile) {
        let mut guard = self.inner.profile.write().expect("poisoned lock");
        *guard = Some(profile);
    }

    /// Replaces the permission entries returned to the current user.
    pub fn set_permissions(&self, permissions: Vec<RawPermission>) {
        let mut guard = self.inner.permissions.write().expect("poisoned lock");
        *guard = permissions;
    }

    /// Adds or replaces an order.
    pub fn add_order(&self, order: Order) {
        let mut guard = self.inner.orders.write().expect("poisoned lock");
        guard.insert(order.id.clone(), order);
    }

    /// Adds or replaces a store.
    pub fn add_store(&self, store: Store) {
        let mut guard = self.inner.stores.write().expect("poisoned lock");
        guard.insert(store.id.clone(), store);
    }

    /// Adds a driver.
    pub fn add_driver(&self, driver: Driver) {
        let mut guard = self.inner.drivers.write().expect("poisoned lock");
        guard.push(driver);
    }

    /// Makes every request fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns how many permission fetches were served.
    pub fn permission_requests(&self) -> u64 {
        self.inner.permission_requests.load(Ordering::SeqCst)
    }

    /// Returns how many times the permission cache was cleared.
    pub fn cache_clears(&self) -> u64 {
        self.inner.cache_clears.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> std::result::Result<(), SourceError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err("service unavailable".into());
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }

    fn order_from_draft(
        id: OrderId,
        draft: OrderDraft,
        status: OrderStatus,
        extra: Map<String, serde_json::Value>,
    ) -> std::result::Result<Order, SourceError> {
        Ok(Order {
            id,
            store_id: draft.store_id.ok_or("storeId is required")?,
            customer_name: draft.customer_name,
            customer_phone: draft.customer_phone,
            delivery_address: draft.delivery_address,
            payment_type: draft.payment_type.ok_or("paymentType is required")?,
            payment_amount: draft.payment_amount.ok_or("paymentAmount is required")?,
            status,
            driver_id: draft.driver_id,
            notes: draft.notes,
            extra,
        })
    }
}

#[async_trait]
impl PermissionSource for MemorySource {
    async fn my_permissions(
        &self,
        store: Option<StoreId>,
    ) -> std::result::Result<Vec<RawPermission>, SourceError> {
        self.ensure_available()?;
        self.inner.permission_requests.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.permissions.read().expect("poisoned lock");
        Ok(guard
            .iter()
            .filter(|entry| match (&store, entry.store_id.as_deref()) {
                (None, _) | (_, None) => true,
                (Some(requested), Some(granted)) => requested.as_str() == granted,
            })
            .cloned()
            .collect())
    }

    async fn clear_all_cache(&self) -> std::result::Result<(), SourceError> {
        self.inner.cache_clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProfileSource for MemorySource {
    async fn me(&self) -> std::result::Result<UserProfile, SourceError> {
        self.ensure_available()?;
        let guard = self.inner.profile.read().expect("poisoned lock");
        guard.clone().ok_or_else(|| "not authenticated".into())
    }
}

#[async_trait]
impl OrderBackend for MemorySource {
    async fn list_orders(
        &self,
        filter: OrderFilter,
    ) -> std::result::Result<Page<Order>, SourceError> {
        self.ensure_available()?;
        let guard = self.inner.orders.read().expect("poisoned lock");
        let matching: Vec<Order> = guard
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        Ok(Page::paginate(matching, filter.page, filter.limit))
    }

    async fn get_order(&self, id: OrderId) -> std::result::Result<Option<Order>, SourceError> {
        self.ensure_available()?;
        let guard = self.inner.orders.read().expect("poisoned lock");
        Ok(guard.get(&id).cloned())
    }

    async fn create_order(&self, draft: OrderDraft) -> std::result::Result<Order, SourceError> {
        self.ensure_available()?;
        let id = OrderId::from_string(self.next_id("ord"));
        let order = Self::order_from_draft(id, draft, OrderStatus::Pending, Map::new())?;
        let mut guard = self.inner.orders.write().expect("poisoned lock");
        guard.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn update_order(
        &self,
        id: OrderId,
        draft: OrderDraft,
    ) -> std::result::Result<Order, SourceError> {
        self.ensure_available()?;
        let mut guard = self.inner.orders.write().expect("poisoned lock");
        let existing = guard
            .get(&id)
            .ok_or_else(|| format!("order {id} not found"))?;
        let order = Self::order_from_draft(
            id.clone(),
            draft,
            existing.status.clone(),
            existing.extra.clone(),
        )?;
        guard.insert(id, order.clone());
        Ok(order)
    }

    async fn delete_order(&self, id: OrderId) -> std::result::Result<(), SourceError> {
        self.ensure_available()?;
        let mut guard = self.inner.orders.write().expect("poisoned lock");
        guard
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| format!("order {id} not found").into())
    }

    async fn validate_order(&self, id: OrderId) -> std::result::Result<Order, SourceError> {
        self.ensure_available()?;
        let mut guard = self.inner.orders.write().expect("poisoned lock");
        let order = guard
            .get_mut(&id)
            .ok_or_else(|| format!("order {id} not found"))?;
        if order.status != OrderStatus::Pending {
            return Err(format!("order {id} is {}", order.status.as_str()).into());
        }
        order.status = OrderStatus::Validated;
        Ok(order.clone())
    }
}

#[async_trait]
impl StoreBackend for MemorySource {
    async fn list_stores(&self) -> std::result::Result<Vec<Store>, SourceError> {
        self.ensure_available()?;
        let guard = self.inner.stores.read().expect("poisoned lock");
        Ok(guard.values().cloned().collect())
    }

    async fn get_store(&self, id: StoreId) -> std::result::Result<Option<Store>, SourceError> {
        self.ensure_available()?;
        let guard = self.inner.stores.read().expect("poisoned lock");
        Ok(guard.get(&id).cloned())
    }

    async fn create_store(&self, draft: StoreDraft) -> std::result::Result<Store, SourceError> {
        self.ensure_available()?;
        let store = Store {
            id: StoreId::from_string(self.next_id("store")),
            name: draft.name,
            address: draft.address,
            phone: draft.phone,
            email: draft.email,
            is_active: Some(true),
            extra: Map::new(),
        };
        let mut guard = self.inner.stores.write().expect("poisoned lock");
        guard.insert(store.id.clone(), store.clone());
        Ok(store)
    }

    async fn update_store(
        &self,
        id: StoreId,
        draft: StoreDraft,
    ) -> std::result::Result<Store, SourceError> {
        self.ensure_available()?;
        let mut guard = self.inner.stores.write().expect("poisoned lock");
        let store = guard
            .get_mut(&id)
            .ok_or_else(|| format!("store {id} not found"))?;
        store.name = draft.name;
        store.address = draft.address;
        store.phone = draft.phone;
        store.email = draft.email;
        Ok(store.clone())
    }

    async fn delete_store(&self, id: StoreId) -> std::result::Result<(), SourceError> {
        self.ensure_available()?;
        let mut guard = self.inner.stores.write().expect("poisoned lock");
        guard
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| format!("store {id} not found").into())
    }
}

#[async_trait]
impl DriverBackend for MemorySource {
    async fn list_drivers(
        &self,
        query: DriverQuery,
    ) -> std::result::Result<Page<Driver>, SourceError> {
        self.ensure_available()?;
        let guard = self.inner.drivers.read().expect("poisoned lock");
        let matching: Vec<Driver> = guard
            .iter()
            .filter(|driver| {
                query
                    .store_id
                    .as_ref()
                    .is_none_or(|store| driver.store_id.as_ref() == Some(store))
            })
            .cloned()
            .collect();
        Ok(Page::paginate(matching, query.page, query.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn permissions_are_narrowed_by_store() {
        let source = MemorySource::new();
        source.set_permissions(vec![
            RawPermission {
                resource: "sales".to_string(),
                actions: vec!["read".to_string()],
                store_id: Some("s1".to_string()),
            },
            RawPermission {
                resource: "report".to_string(),
                actions: vec!["export".to_string()],
                store_id: None,
            },
        ]);

        let s2 = StoreId::try_from("s2").unwrap();
        let narrowed = block_on(source.my_permissions(Some(s2))).unwrap();
        let all = block_on(source.my_permissions(None)).unwrap();

        assert_eq!(narrowed.len(), 1);
        assert_eq!(all.len(), 2);
        assert_eq!(source.permission_requests(), 2);
    }

    #[test]
    fn unavailable_source_fails_requests() {
        let source = MemorySource::new();
        source.set_unavailable(true);

        let err = block_on(source.list_stores()).unwrap_err();
        assert_eq!(err.to_string(), "service unavailable");
    }
}
