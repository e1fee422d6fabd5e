//! Client-side permission engine for a multi-tenant retail console.
//!
//! This crate provides strong-typed identifiers and permission entries, a
//! pure evaluator over the signed-in user's permission set, a session
//! context that loads that set and tracks the selected store, gating
//! decisions for guarded content and permission-aware controls, and the
//! order, store and driver list slices. Every check is deny-by-default: an
//! absent or empty permission set grants nothing.
//!
//! Client-side gating only shapes the interface. The server remains the
//! authority for every request it receives.
//!
//! # Examples
//!
//! Signing in against the in-memory source (enable `memory-source`):
//! ```no_run
//! # #[cfg(feature = "memory-source")]
//! # futures::executor::block_on(async {
//! use console_access::{
//!     Action, ContextBuilder, Guard, GuardSlots, MemorySource, RawPermission, Requirement,
//!     Resource,
//! };
//! let source = MemorySource::new();
//! source.set_permissions(vec![RawPermission {
//!     resource: "inventory".to_string(),
//!     actions: vec!["read".to_string()],
//!     store_id: None,
//! }]);
//! let context = ContextBuilder::new(source.clone()).build();
//! context.sign_in_with(&source).await.ok();
//!
//! let guard = Guard::new(Requirement::new(Resource::Inventory, Action::Read));
//! let shown = guard.render(&context.snapshot(), GuardSlots::new("stock table"));
//! # let _ = shown;
//! # });
//! ```
//!
//! Caching loaded sets across contexts (enable `memory-cache`):
//! ```no_run
//! # #[cfg(feature = "memory-cache")]
//! # {
//! use console_access::MemoryCache;
//! use std::time::Duration;
//! let cache = MemoryCache::new(256).with_ttl(Duration::from_secs(300));
//! # let _ = cache;
//! # }
//! ```
#![forbid(unsafe_code)]

mod banner;
mod cache;
mod context;
mod drivers;
mod error;
mod evaluator;
mod guard;
mod orders;
mod permission;
mod sequence;
mod slice;
mod source;
mod stores;
mod types;
mod validation;
#[cfg(feature = "memory-cache")]
mod memory_cache;

#[cfg(feature = "memory-source")]
mod memory_source;

#[cfg(feature = "http-client")]
pub mod api;

pub use crate::banner::{Banner, DEFAULT_DISPLAY};
pub use crate::cache::{NoCache, PermissionCache};
pub use crate::context::{ContextBuilder, PermissionContext, Snapshot, Status};
pub use crate::drivers::{Driver, DriverQuery, DriverSlice, DriverStats, DriverStatus};
pub use crate::error::{Error, Result, SourceError};
pub use crate::evaluator::{Decision, Evaluator};
pub use crate::guard::{
    AccessCheck, ActionControl, Activation, Confirm, ControlState, DEFAULT_DENIED_TOOLTIP,
    DeniedBehavior, Guard, GuardOutcome, GuardSlots, Requirement,
};
pub use crate::orders::{Order, OrderDraft, OrderFilter, OrderSlice, OrderStatus, PaymentType};
pub use crate::permission::{
    Action, ActionGrant, Permission, PermissionSet, RawPermission, Resource, WILDCARD,
};
pub use crate::sequence::{RequestSequence, Settled, Ticket};
pub use crate::slice::{DEFAULT_PAGE_LIMIT, ListSlice, ListView, Page, Pagination};
pub use crate::source::{
    Backend, DriverBackend, OrderBackend, PermissionSource, ProfileSource, StoreBackend,
};
pub use crate::stores::{Store, StoreDraft, StoreSlice};
pub use crate::types::{DriverId, OrderId, StoreId, UserId, UserProfile};
pub use crate::validation::FieldErrors;

#[cfg(feature = "memory-source")]
pub use crate::memory_source::MemorySource;

#[cfg(feature = "memory-cache")]
pub use crate::memory_cache::MemoryCache;

#[cfg(feature = "http-client")]
pub use crate::api::{ApiClient, ApiConfig};
