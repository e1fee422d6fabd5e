use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::PermissionCache;
use crate::permission::PermissionSet;
use crate::types::UserId;

/// In-memory cache for loaded permission sets.
///
/// Bounded by `capacity` users; the least recently read or written entry
/// goes first. Clones share the same storage, so one cache can back several
/// contexts within a process.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    slots: Arc<Mutex<Slots>>,
    capacity: usize,
    ttl: Option<Duration>,
}

#[derive(Debug, Default)]
struct Slots {
    by_user: HashMap<UserId, Slot>,
    clock: u64,
}

#[derive(Debug)]
struct Slot {
    permissions: PermissionSet,
    stored_at: Instant,
    last_used: u64,
}

impl Slots {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn drop_stale(&mut self, ttl: Option<Duration>, now: Instant) {
        if let Some(ttl) = ttl {
            self.by_user
                .retain(|_, slot| now.saturating_duration_since(slot.stored_at) <= ttl);
        }
    }

    fn shrink_to(&mut self, capacity: usize) {
        while self.by_user.len() > capacity {
            let oldest = self
                .by_user
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(user, _)| user.clone());
            match oldest {
                Some(user) => {
                    self.by_user.remove(&user);
                }
                None => break,
            }
        }
    }
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` users.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            capacity,
            ttl: None,
        }
    }

    /// Expires entries `ttl` after they were stored.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Returns the number of stored entries, expired ones included until
    /// the next access prunes them.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("poisoned lock").by_user.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PermissionCache for MemoryCache {
    async fn get(&self, user: &UserId) -> Option<PermissionSet> {
        let mut slots = self.slots.lock().expect("poisoned lock");
        slots.drop_stale(self.ttl, Instant::now());
        let stamp = slots.tick();
        let slot = slots.by_user.get_mut(user)?;
        slot.last_used = stamp;
        Some(slot.permissions.clone())
    }

    async fn set(&self, user: &UserId, permissions: PermissionSet) {
        if self.capacity == 0 {
            return;
        }
        let now = Instant::now();
        let mut slots = self.slots.lock().expect("poisoned lock");
        slots.drop_stale(self.ttl, now);
        let last_used = slots.tick();
        slots.by_user.insert(
            user.clone(),
            Slot {
                permissions,
                stored_at: now,
                last_used,
            },
        );
        slots.shrink_to(self.capacity);
    }

    async fn invalidate_user(&self, user: &UserId) {
        self.slots
            .lock()
            .expect("poisoned lock")
            .by_user
            .remove(user);
    }

    async fn clear(&self) {
        self.slots.lock().expect("poisoned lock").by_user.clear();
    }
}
