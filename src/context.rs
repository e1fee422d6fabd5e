use crate::banner::{Banner, DEFAULT_DISPLAY};
use crate::cache::{NoCache, PermissionCache};
use crate::error::{Error, Result, SourceError};
use crate::evaluator::Evaluator;
use crate::permission::{Action, ActionGrant, PermissionSet, Resource};
use crate::sequence::{RequestSequence, Settled, Ticket};
use crate::source::{PermissionSource, ProfileSource};
use crate::types::{StoreId, UserId, UserProfile};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Lifecycle of the permission context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No authenticated user.
    Uninitialized,
    /// A permission fetch is in flight.
    Loading,
    /// Permissions are loaded.
    Ready,
    /// The last fetch failed.
    Errored,
}

/// Point-in-time view of the context.
///
/// Every permission check of [`Evaluator`] is available here, bound to
/// the loaded set.
#[derive(Debug, Clone)]
pub struct Snapshot {
    status: Status,
    user: Option<UserProfile>,
    permissions: Option<Arc<PermissionSet>>,
    current_store: Option<StoreId>,
    error: Option<String>,
}

impl Snapshot {
    /// Returns the lifecycle status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns whether a fetch is in flight.
    pub fn loading(&self) -> bool {
        self.status == Status::Loading
    }

    /// Returns the visible error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the signed-in user.
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// Returns the loaded permission set.
    pub fn permissions(&self) -> Option<&PermissionSet> {
        self.permissions.as_deref()
    }

    /// Returns the selected store.
    pub fn current_store(&self) -> Option<&StoreId> {
        self.current_store.as_ref()
    }

    /// Returns an evaluator bound to the loaded set.
    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(self.permissions())
    }

    /// See [`Evaluator::has_permission`].
    pub fn has_permission(&self, resource: Resource, action: Action, store: Option<&StoreId>) -> bool {
        self.evaluator().has_permission(resource, action, store)
    }

    /// See [`Evaluator::has_any_permission`].
    pub fn has_any_permission(
        &self,
        resource: Resource,
        actions: &[Action],
        store: Option<&StoreId>,
    ) -> bool {
        self.evaluator().has_any_permission(resource, actions, store)
    }

    /// See [`Evaluator::has_all_permissions`].
    pub fn has_all_permissions(
        &self,
        resource: Resource,
        actions: &[Action],
        store: Option<&StoreId>,
    ) -> bool {
        self.evaluator().has_all_permissions(resource, actions, store)
    }

    /// See [`Evaluator::resource_permissions`].
    pub fn resource_permissions(
        &self,
        resource: Resource,
        store: Option<&StoreId>,
    ) -> BTreeSet<ActionGrant> {
        self.evaluator().resource_permissions(resource, store)
    }

    /// See [`Evaluator::user_stores`].
    pub fn user_stores(&self) -> BTreeSet<StoreId> {
        self.evaluator().user_stores()
    }

    /// See [`Evaluator::can_access_store`].
    pub fn can_access_store(&self, store: &StoreId) -> bool {
        self.evaluator().can_access_store(store)
    }

    /// See [`Evaluator::is_super_admin`].
    pub fn is_super_admin(&self) -> bool {
        self.evaluator().is_super_admin()
    }

    /// Checks `action` in the selected store, or unscoped when none is selected.
    pub fn has_permission_in_current_store(&self, resource: Resource, action: Action) -> bool {
        self.has_permission(resource, action, self.current_store())
    }
}

#[derive(Debug)]
struct ContextState {
    status: Status,
    user: Option<UserProfile>,
    permissions: Option<Arc<PermissionSet>>,
    current_store: Option<StoreId>,
    error: Banner,
    sequence: RequestSequence,
}

/// Session-wide permission state with a single writer.
///
/// The set is fetched once per sign-in, replaced wholesale on refresh and
/// dropped on sign-out. Each load takes a [`Ticket`]; a result is only
/// committed if no newer load (or sign-out) was issued meanwhile.
#[derive(Debug)]
pub struct PermissionContext<S, C = NoCache> {
    source: S,
    cache: C,
    state: RwLock<ContextState>,
}

/// Builder for [`PermissionContext`].
pub struct ContextBuilder<S, C = NoCache> {
    source: S,
    cache: C,
    error_display: Duration,
}

impl<S> ContextBuilder<S, NoCache> {
    /// Creates a new builder with default configuration.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: NoCache,
            error_display: DEFAULT_DISPLAY,
        }
    }
}

impl<S, C> ContextBuilder<S, C> {
    /// Sets how long an error message stays visible.
    pub fn error_display(mut self, display: Duration) -> Self {
        self.error_display = display;
        self
    }

    /// Sets the cache implementation.
    pub fn cache<C2: PermissionCache>(self, cache: C2) -> ContextBuilder<S, C2> {
        ContextBuilder {
            source: self.source,
            cache,
            error_display: self.error_display,
        }
    }

    /// Builds the context in the uninitialized state.
    pub fn build(self) -> PermissionContext<S, C> {
        PermissionContext {
            source: self.source,
            cache: self.cache,
            state: RwLock::new(ContextState {
                status: Status::Uninitialized,
                user: None,
                permissions: None,
                current_store: None,
                error: Banner::new(self.error_display),
                sequence: RequestSequence::new(),
            }),
        }
    }
}

enum Load {
    Cached,
    Forced,
}

impl<S, C> PermissionContext<S, C>
where
    S: PermissionSource + Send + Sync,
    C: PermissionCache,
{
    /// Returns the permission source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the current state.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_at(Instant::now())
    }

    /// Returns the state with the error message evaluated at `now`.
    pub fn snapshot_at(&self, now: Instant) -> Snapshot {
        let guard = self.state.read().expect("poisoned lock");
        Snapshot {
            status: guard.status,
            user: guard.user.clone(),
            permissions: guard.permissions.clone(),
            current_store: guard.current_store.clone(),
            error: guard.error.current_at(now).map(str::to_string),
        }
    }

    /// Returns the lifecycle status.
    pub fn status(&self) -> Status {
        self.state.read().expect("poisoned lock").status
    }

    /// Returns whether a fetch is in flight.
    pub fn loading(&self) -> bool {
        self.status() == Status::Loading
    }

    /// Returns the visible error message, if any.
    pub fn error(&self) -> Option<String> {
        let guard = self.state.read().expect("poisoned lock");
        guard.error.current().map(str::to_string)
    }

    /// Returns the selected store.
    pub fn current_store(&self) -> Option<StoreId> {
        self.state.read().expect("poisoned lock").current_store.clone()
    }

    /// See [`Evaluator::has_permission`].
    pub fn has_permission(&self, resource: Resource, action: Action, store: Option<&StoreId>) -> bool {
        self.snapshot().has_permission(resource, action, store)
    }

    /// See [`Evaluator::has_any_permission`].
    pub fn has_any_permission(
        &self,
        resource: Resource,
        actions: &[Action],
        store: Option<&StoreId>,
    ) -> bool {
        self.snapshot().has_any_permission(resource, actions, store)
    }

    /// See [`Evaluator::has_all_permissions`].
    pub fn has_all_permissions(
        &self,
        resource: Resource,
        actions: &[Action],
        store: Option<&StoreId>,
    ) -> bool {
        self.snapshot().has_all_permissions(resource, actions, store)
    }

    /// See [`Evaluator::resource_permissions`].
    pub fn resource_permissions(
        &self,
        resource: Resource,
        store: Option<&StoreId>,
    ) -> BTreeSet<ActionGrant> {
        self.snapshot().resource_permissions(resource, store)
    }

    /// See [`Evaluator::user_stores`].
    pub fn user_stores(&self) -> BTreeSet<StoreId> {
        self.snapshot().user_stores()
    }

    /// See [`Evaluator::can_access_store`].
    pub fn can_access_store(&self, store: &StoreId) -> bool {
        self.snapshot().can_access_store(store)
    }

    /// See [`Evaluator::is_super_admin`].
    pub fn is_super_admin(&self) -> bool {
        self.snapshot().is_super_admin()
    }

    /// Marks `user` as authenticated and loads their permissions.
    ///
    /// A cached set for the user is used when present.
    pub async fn sign_in(&self, user: UserProfile) -> Result<Settled> {
        let (ticket, user_id) = {
            let mut guard = self.state.write().expect("poisoned lock");
            let user_id = user.id.clone();
            if guard.user.as_ref().is_some_and(|current| current.id != user_id) {
                guard.current_store = None;
                guard.permissions = None;
            }
            guard.user = Some(user);
            guard.status = Status::Loading;
            (guard.sequence.issue(), user_id)
        };
        tracing::debug!(user = %user_id, ticket = ticket.get(), "loading permissions");
        self.load(ticket, user_id, Load::Cached).await
    }

    /// Fetches the session profile from `profiles`, then signs in.
    ///
    /// A failed profile fetch leaves the context uninitialized and shows
    /// the error.
    pub async fn sign_in_with<P>(&self, profiles: &P) -> Result<Settled>
    where
        P: ProfileSource + Sync,
    {
        match profiles.me().await {
            Ok(user) => self.sign_in(user).await,
            Err(err) => {
                tracing::warn!(error = %err, "profile fetch failed");
                let mut guard = self.state.write().expect("poisoned lock");
                guard.error.set(err.to_string(), Instant::now());
                Err(Error::Source(err))
            }
        }
    }

    /// Reloads the permission set from the source, bypassing the cache.
    pub async fn refresh_permissions(&self) -> Result<Settled> {
        let (ticket, user_id) = {
            let mut guard = self.state.write().expect("poisoned lock");
            let Some(user_id) = guard.user.as_ref().map(|user| user.id.clone()) else {
                return Err(Error::NotSignedIn);
            };
            guard.status = Status::Loading;
            (guard.sequence.issue(), user_id)
        };
        tracing::debug!(user = %user_id, ticket = ticket.get(), "refreshing permissions");
        self.load(ticket, user_id, Load::Forced).await
    }

    /// Clears every piece of session state.
    ///
    /// State is reset before any cache invalidation is awaited, so checks
    /// fail closed immediately. In-flight loads are superseded.
    pub async fn sign_out(&self) {
        let user = {
            let mut guard = self.state.write().expect("poisoned lock");
            guard.sequence.issue();
            guard.status = Status::Uninitialized;
            guard.permissions = None;
            guard.current_store = None;
            guard.error.clear();
            guard.user.take()
        };

        if let Some(user) = user {
            tracing::debug!(user = %user.id, "signed out");
            self.cache.invalidate_user(&user.id).await;
        }
        if let Err(err) = self.source.clear_all_cache().await {
            tracing::warn!(error = %err, "failed to clear permission source cache");
        }
    }

    /// Selects the store used as the default scope; never refetches.
    pub fn switch_store(&self, store: Option<StoreId>) -> Result<()> {
        let mut guard = self.state.write().expect("poisoned lock");
        if guard.status == Status::Uninitialized {
            return Err(Error::NotSignedIn);
        }
        tracing::debug!(store = ?store, "switching store");
        guard.current_store = store;
        Ok(())
    }

    async fn load(&self, ticket: Ticket, user: UserId, mode: Load) -> Result<Settled> {
        if matches!(mode, Load::Cached)
            && let Some(cached) = self.cache.get(&user).await
        {
            return self.commit(ticket, Ok(cached));
        }

        let result = self
            .source
            .my_permissions(None)
            .await
            .map(PermissionSet::from_raw);
        // Only the current load may write the cache; a sign-out or newer
        // load landing during the write drops the entry again.
        if let Ok(permissions) = &result
            && self.is_current(ticket)
        {
            self.cache.set(&user, permissions.clone()).await;
            if !self.is_current(ticket) {
                self.cache.invalidate_user(&user).await;
            }
        }
        self.commit(ticket, result)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.state
            .read()
            .expect("poisoned lock")
            .sequence
            .is_current(ticket)
    }

    fn commit(
        &self,
        ticket: Ticket,
        result: std::result::Result<PermissionSet, SourceError>,
    ) -> Result<Settled> {
        let mut guard = self.state.write().expect("poisoned lock");
        if !guard.sequence.is_current(ticket) {
            tracing::debug!(ticket = ticket.get(), "discarding superseded permission result");
            return Ok(Settled::Superseded);
        }
        match result {
            Ok(permissions) => {
                guard.permissions = Some(Arc::new(permissions));
                guard.status = Status::Ready;
                guard.error.clear();
                Ok(Settled::Committed)
            }
            Err(err) => {
                tracing::warn!(error = %err, "permission fetch failed");
                guard.permissions = None;
                guard.status = Status::Errored;
                guard.error.set(err.to_string(), Instant::now());
                Err(Error::Source(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::RawPermission;
    use async_trait::async_trait;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Reply = std::result::Result<Vec<RawPermission>, String>;

    #[derive(Default)]
    struct GatedSource {
        pending: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
        immediate: Mutex<Option<Vec<RawPermission>>>,
        clears: Mutex<usize>,
    }

    impl GatedSource {
        fn immediate(entries: Vec<RawPermission>) -> Self {
            Self {
                immediate: Mutex::new(Some(entries)),
                ..Self::default()
            }
        }

        fn gated(count: usize) -> (Self, Vec<oneshot::Sender<Reply>>) {
            let mut senders = Vec::new();
            let mut receivers = VecDeque::new();
            for _ in 0..count {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                receivers.push_back(rx);
            }
            let source = Self {
                pending: Mutex::new(receivers),
                ..Self::default()
            };
            (source, senders)
        }
    }

    #[async_trait]
    impl PermissionSource for GatedSource {
        async fn my_permissions(
            &self,
            _store: Option<StoreId>,
        ) -> std::result::Result<Vec<RawPermission>, SourceError> {
            let immediate = self.immediate.lock().unwrap().clone();
            if let Some(entries) = immediate {
                return Ok(entries);
            }
            let receiver = self.pending.lock().unwrap().pop_front().expect("gate");
            match receiver.await {
                Ok(Ok(entries)) => Ok(entries),
                Ok(Err(message)) => Err(message.into()),
                Err(canceled) => Err(canceled.into()),
            }
        }

        async fn clear_all_cache(&self) -> std::result::Result<(), SourceError> {
            *self.clears.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: UserId::try_from(id).unwrap(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: format!("{id}@example.com"),
            phone: None,
            role: "manager".to_string(),
            status: "active".to_string(),
        }
    }

    fn entry(resource: &str, actions: &[&str], store: Option<&str>) -> RawPermission {
        RawPermission {
            resource: resource.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            store_id: store.map(str::to_string),
        }
    }

    fn store(value: &str) -> StoreId {
        StoreId::try_from(value).unwrap()
    }

    #[test]
    fn sign_in_loads_permissions_and_becomes_ready() {
        let source = GatedSource::immediate(vec![entry("sales", &["read"], Some("s1"))]);
        let context = ContextBuilder::new(source).build();

        assert_eq!(context.status(), Status::Uninitialized);
        let settled = block_on(context.sign_in(profile("u1"))).unwrap();

        assert_eq!(settled, Settled::Committed);
        let snapshot = context.snapshot();
        assert_eq!(snapshot.status(), Status::Ready);
        assert!(snapshot.error().is_none());
        assert!(snapshot.has_permission(Resource::Sales, Action::Read, Some(&store("s1"))));
        assert!(!snapshot.has_permission(Resource::Sales, Action::Read, Some(&store("s2"))));
    }

    #[test]
    fn sign_out_clears_everything_and_fails_closed() {
        let source = GatedSource::immediate(vec![entry("store", &["*"], None)]);
        let context = ContextBuilder::new(source).build();
        block_on(context.sign_in(profile("u1"))).unwrap();
        context.switch_store(Some(store("s1"))).unwrap();
        assert!(context.is_super_admin());

        block_on(context.sign_out());

        let snapshot = context.snapshot();
        assert_eq!(snapshot.status(), Status::Uninitialized);
        assert!(snapshot.permissions().is_none());
        assert!(snapshot.current_store().is_none());
        assert!(!snapshot.loading());
        assert!(!context.has_permission(Resource::Store, Action::Read, None));
        assert!(!context.is_super_admin());
        assert_eq!(*context.source().clears.lock().unwrap(), 1);
    }

    #[test]
    fn switch_store_requires_sign_in_and_never_refetches() {
        let (source, mut senders) = GatedSource::gated(1);
        let context = ContextBuilder::new(source).build();

        assert!(matches!(
            context.switch_store(Some(store("s1"))),
            Err(Error::NotSignedIn)
        ));

        let tx = senders.remove(0);
        let (settled, ()) = block_on(async {
            futures::join!(context.sign_in(profile("u1")), async {
                context.switch_store(Some(store("s2"))).unwrap();
                tx.send(Ok(vec![entry("inventory", &["read"], Some("s2"))]))
                    .unwrap();
            })
        });

        assert_eq!(settled.unwrap(), Settled::Committed);
        assert_eq!(context.current_store(), Some(store("s2")));
        context.switch_store(Some(store("s3"))).unwrap();
        assert!(context.source().pending.lock().unwrap().is_empty());
        let snapshot = context.snapshot();
        assert!(!snapshot.has_permission_in_current_store(Resource::Inventory, Action::Read));
        assert!(snapshot.has_permission(Resource::Inventory, Action::Read, None));
    }

    #[test]
    fn stale_fetch_finishing_last_does_not_overwrite_newer_result() {
        let (source, mut senders) = GatedSource::gated(2);
        let context = ContextBuilder::new(source).build();
        let tx_b = senders.pop().unwrap();
        let tx_a = senders.pop().unwrap();

        let (a, b, ()) = block_on(async {
            futures::join!(context.sign_in(profile("u1")), context.refresh_permissions(), async {
                tx_b.send(Ok(vec![entry("report", &["export"], None)])).unwrap();
                futures::pending!();
                tx_a.send(Ok(vec![entry("sales", &["read"], None)])).unwrap();
            })
        });

        assert_eq!(a.unwrap(), Settled::Superseded);
        assert_eq!(b.unwrap(), Settled::Committed);
        let snapshot = context.snapshot();
        assert_eq!(snapshot.status(), Status::Ready);
        assert!(snapshot.has_permission(Resource::Report, Action::Export, None));
        assert!(!snapshot.has_permission(Resource::Sales, Action::Read, None));
    }

    #[test]
    fn superseded_failure_does_not_flip_state_to_errored() {
        let (source, mut senders) = GatedSource::gated(2);
        let context = ContextBuilder::new(source).build();
        let tx_b = senders.pop().unwrap();
        let tx_a = senders.pop().unwrap();

        let (a, b, ()) = block_on(async {
            futures::join!(context.sign_in(profile("u1")), context.refresh_permissions(), async {
                tx_b.send(Ok(vec![entry("tax", &["read"], None)])).unwrap();
                tx_a.send(Err("timeout".to_string())).unwrap();
            })
        });

        assert_eq!(a.unwrap(), Settled::Superseded);
        assert_eq!(b.unwrap(), Settled::Committed);
        assert_eq!(context.status(), Status::Ready);
        assert!(context.error().is_none());
    }

    #[test]
    fn failed_fetch_sets_errored_with_auto_clearing_message() {
        let (source, mut senders) = GatedSource::gated(1);
        let context = ContextBuilder::new(source)
            .error_display(Duration::from_secs(5))
            .build();
        let tx = senders.remove(0);
        tx.send(Err("network unreachable".to_string())).unwrap();

        let result = block_on(context.sign_in(profile("u1")));

        assert!(matches!(result, Err(Error::Source(_))));
        let now = Instant::now();
        let snapshot = context.snapshot_at(now);
        assert_eq!(snapshot.status(), Status::Errored);
        assert!(snapshot.permissions().is_none());
        assert_eq!(snapshot.error(), Some("network unreachable"));
        assert!(!snapshot.has_permission(Resource::Sales, Action::Read, None));

        let later = context.snapshot_at(now + Duration::from_secs(6));
        assert_eq!(later.error(), None);
        assert_eq!(later.status(), Status::Errored);
    }

    #[test]
    fn sign_out_supersedes_in_flight_load() {
        let (source, mut senders) = GatedSource::gated(1);
        let context = ContextBuilder::new(source).build();
        let tx = senders.remove(0);

        let (settled, ()) = block_on(async {
            futures::join!(context.sign_in(profile("u1")), async {
                assert!(context.loading());
                context.sign_out().await;
                tx.send(Ok(vec![entry("sales", &["*"], None)])).unwrap();
            })
        });

        assert_eq!(settled.unwrap(), Settled::Superseded);
        assert_eq!(context.status(), Status::Uninitialized);
        assert!(!context.has_permission(Resource::Sales, Action::Read, None));
    }

    #[cfg(feature = "memory-cache")]
    #[test]
    fn load_superseded_by_sign_out_never_reaches_the_cache() {
        let (source, mut senders) = GatedSource::gated(2);
        let cache = crate::memory_cache::MemoryCache::new(4);
        let context = ContextBuilder::new(source).cache(cache.clone()).build();
        let tx_fresh = senders.pop().unwrap();
        let tx_stale = senders.pop().unwrap();

        let (settled, ()) = block_on(async {
            futures::join!(context.sign_in(profile("u1")), async {
                context.sign_out().await;
                tx_stale.send(Ok(vec![entry("sales", &["*"], None)])).unwrap();
            })
        });

        assert_eq!(settled.unwrap(), Settled::Superseded);
        assert!(cache.is_empty());

        tx_fresh
            .send(Ok(vec![entry("report", &["export"], None)]))
            .unwrap();
        assert_eq!(
            block_on(context.sign_in(profile("u1"))).unwrap(),
            Settled::Committed
        );
        assert!(context.source().pending.lock().unwrap().is_empty());
        assert!(context.has_permission(Resource::Report, Action::Export, None));
        assert!(!context.has_permission(Resource::Sales, Action::Read, None));
        assert_eq!(cache.len(), 1);
    }

    #[cfg(feature = "memory-cache")]
    #[test]
    fn stale_fetch_does_not_overwrite_cached_newer_set() {
        let (source, mut senders) = GatedSource::gated(2);
        let cache = crate::memory_cache::MemoryCache::new(4);
        let context = ContextBuilder::new(source).cache(cache.clone()).build();
        let tx_b = senders.pop().unwrap();
        let tx_a = senders.pop().unwrap();

        let (a, b, ()) = block_on(async {
            futures::join!(context.sign_in(profile("u1")), context.refresh_permissions(), async {
                tx_b.send(Ok(vec![entry("report", &["export"], None)])).unwrap();
                futures::pending!();
                tx_a.send(Ok(vec![entry("sales", &["read"], None)])).unwrap();
            })
        });

        assert_eq!(a.unwrap(), Settled::Superseded);
        assert_eq!(b.unwrap(), Settled::Committed);
        let cached = block_on(cache.get(&UserId::try_from("u1").unwrap())).unwrap();
        let evaluator = Evaluator::new(Some(&cached));
        assert!(evaluator.has_permission(Resource::Report, Action::Export, None));
        assert!(!evaluator.has_permission(Resource::Sales, Action::Read, None));
    }

    #[test]
    fn refresh_requires_sign_in() {
        let context = ContextBuilder::new(GatedSource::default()).build();
        let result = block_on(context.refresh_permissions());
        assert!(matches!(result, Err(Error::NotSignedIn)));
    }
}
