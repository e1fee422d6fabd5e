use crate::permission::PermissionSet;
use crate::types::UserId;
use async_trait::async_trait;

/// Cache interface for loaded permission sets.
///
/// A user's set covers every store they can reach, so entries are keyed by
/// user alone.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// Gets the cached set of a user.
    async fn get(&self, user: &UserId) -> Option<PermissionSet>;

    /// Stores the set of a user, replacing any previous one.
    async fn set(&self, user: &UserId, permissions: PermissionSet);

    /// Drops the entry of a user.
    async fn invalidate_user(&self, user: &UserId);

    /// Invalidates everything.
    async fn clear(&self);
}

/// No-op cache implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl PermissionCache for NoCache {
    async fn get(&self, _user: &UserId) -> Option<PermissionSet> {
        None
    }

    async fn set(&self, _user: &UserId, _permissions: PermissionSet) {}

    async fn invalidate_user(&self, _user: &UserId) {}

    async fn clear(&self) {}
}
