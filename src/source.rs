use crate::drivers::{Driver, DriverQuery};
use crate::error::SourceError;
use crate::orders::{Order, OrderDraft, OrderFilter};
use crate::permission::RawPermission;
use crate::slice::Page;
use crate::stores::{Store, StoreDraft};
use crate::types::{OrderId, StoreId, UserProfile};
use async_trait::async_trait;

/// Source of the signed-in user's permission entries.
#[async_trait]
pub trait PermissionSource {
    /// Returns the raw permission entries of the current user.
    ///
    /// `store` narrows the server-side query; `None` returns every entry.
    async fn my_permissions(
        &self,
        store: Option<StoreId>,
    ) -> std::result::Result<Vec<RawPermission>, SourceError>;

    /// Drops any cached permission data held by the source.
    async fn clear_all_cache(&self) -> std::result::Result<(), SourceError>;
}

/// Source of the authenticated user's profile.
#[async_trait]
pub trait ProfileSource {
    /// Returns the profile behind the current session.
    async fn me(&self) -> std::result::Result<UserProfile, SourceError>;
}

/// Order operations of the remote API.
#[async_trait]
pub trait OrderBackend {
    /// Returns one page of orders matching `filter`.
    async fn list_orders(
        &self,
        filter: OrderFilter,
    ) -> std::result::Result<Page<Order>, SourceError>;

    /// Returns a single order, `None` when it does not exist.
    async fn get_order(&self, id: OrderId) -> std::result::Result<Option<Order>, SourceError>;

    /// Creates an order from a validated draft.
    async fn create_order(&self, draft: OrderDraft) -> std::result::Result<Order, SourceError>;

    /// Replaces the editable fields of an order.
    async fn update_order(
        &self,
        id: OrderId,
        draft: OrderDraft,
    ) -> std::result::Result<Order, SourceError>;

    /// Deletes an order.
    async fn delete_order(&self, id: OrderId) -> std::result::Result<(), SourceError>;

    /// Marks an order as validated by the store.
    async fn validate_order(&self, id: OrderId) -> std::result::Result<Order, SourceError>;
}

/// Store operations of the remote API.
#[async_trait]
pub trait StoreBackend {
    /// Returns every store visible to the user.
    async fn list_stores(&self) -> std::result::Result<Vec<Store>, SourceError>;

    /// Returns a single store, `None` when it does not exist.
    async fn get_store(&self, id: StoreId) -> std::result::Result<Option<Store>, SourceError>;

    /// Creates a store.
    async fn create_store(&self, draft: StoreDraft) -> std::result::Result<Store, SourceError>;

    /// Replaces the editable fields of a store.
    async fn update_store(
        &self,
        id: StoreId,
        draft: StoreDraft,
    ) -> std::result::Result<Store, SourceError>;

    /// Deletes a store.
    async fn delete_store(&self, id: StoreId) -> std::result::Result<(), SourceError>;
}

/// Driver operations of the remote API.
#[async_trait]
pub trait DriverBackend {
    /// Returns one page of drivers.
    async fn list_drivers(
        &self,
        query: DriverQuery,
    ) -> std::result::Result<Page<Driver>, SourceError>;
}

/// Composite backend trait.
pub trait Backend:
    PermissionSource + ProfileSource + OrderBackend + StoreBackend + DriverBackend + Send + Sync
{
}

impl<T> Backend for T where
    T: PermissionSource + ProfileSource + OrderBackend + StoreBackend + DriverBackend + Send + Sync
{
}
