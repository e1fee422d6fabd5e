//! Store records and the store management slice.

use crate::banner::DEFAULT_DISPLAY;
use crate::error::{Error, Result, SourceError};
use crate::sequence::Settled;
use crate::slice::{ListSlice, ListView, Page};
use crate::source::StoreBackend;
use crate::types::StoreId;
use crate::validation::FieldErrors;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Store (retail location) as returned by the API.
///
/// Optional fields are always written, `null` when unset; unmodeled fields
/// stay in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Store {
    /// Returns whether the store is active; stores that do not say are.
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }
}

/// Editable store fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDraft {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl StoreDraft {
    /// Fills a draft from an existing store.
    pub fn from_store(store: &Store) -> Self {
        Self {
            name: store.name.clone(),
            address: store.address.clone(),
            phone: store.phone.clone(),
            email: store.email.clone(),
        }
    }

    /// Checks required fields and the e-mail shape.
    pub fn validate(&self) -> std::result::Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", "Store name", &self.name);
        errors.require("address", "Address", &self.address);
        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                errors.add("email", "Email is not valid");
            }
        }
        errors.into_result()
    }
}

/// Store list state bound to a [`StoreBackend`].
#[derive(Debug)]
pub struct StoreSlice<B> {
    backend: B,
    list: ListSlice<Store, ()>,
}

impl<B> StoreSlice<B>
where
    B: StoreBackend + Send + Sync,
{
    /// Creates an empty slice.
    pub fn new(backend: B) -> Self {
        Self::with_display(backend, DEFAULT_DISPLAY)
    }

    /// Creates an empty slice whose messages stay visible for `display`.
    pub fn with_display(backend: B, display: Duration) -> Self {
        Self {
            backend,
            list: ListSlice::with_display((), display),
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the current list state.
    pub fn view(&self) -> ListView<Store, ()> {
        self.list.view()
    }

    /// Reloads the store list.
    pub async fn fetch(&self) -> Result<Settled> {
        self.list
            .load((), |()| async {
                self.backend.list_stores().await.map(Page::single)
            })
            .await
    }

    /// Loads one store; a missing store shows a notice.
    pub async fn get(&self, id: &StoreId) -> Result<Option<Store>> {
        let found = self
            .backend
            .get_store(id.clone())
            .await
            .map_err(|err| self.fail("load store", err))?;
        if found.is_none() {
            self.list.notify(format!("Store {id} not found"));
        }
        Ok(found)
    }

    /// Validates `draft` locally, then creates the store.
    pub async fn create(&self, draft: &StoreDraft) -> Result<Store> {
        draft.validate()?;
        let store = self
            .backend
            .create_store(draft.clone())
            .await
            .map_err(|err| self.fail("create store", err))?;
        self.refetch().await;
        Ok(store)
    }

    /// Validates `draft` locally, then updates store `id`.
    pub async fn update(&self, id: &StoreId, draft: &StoreDraft) -> Result<Store> {
        draft.validate()?;
        let store = self
            .backend
            .update_store(id.clone(), draft.clone())
            .await
            .map_err(|err| self.fail("update store", err))?;
        self.refetch().await;
        Ok(store)
    }

    /// Deletes store `id`.
    pub async fn delete(&self, id: &StoreId) -> Result<()> {
        self.backend
            .delete_store(id.clone())
            .await
            .map_err(|err| self.fail("delete store", err))?;
        self.refetch().await;
        Ok(())
    }

    async fn refetch(&self) {
        if let Err(err) = self.fetch().await {
            tracing::warn!(error = %err, "store refetch after mutation failed");
        }
    }

    fn fail(&self, operation: &str, err: SourceError) -> Error {
        tracing::warn!(operation, error = %err, "store request failed");
        self.list.report_error(format!("Failed to {operation}: {err}"));
        Error::Source(err)
    }
}
