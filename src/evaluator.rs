use crate::permission::{Action, ActionGrant, Permission, PermissionSet, Resource};
use crate::types::StoreId;
use std::collections::BTreeSet;

/// Access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny,
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

/// Pure permission checks over a borrowed [`PermissionSet`].
///
/// Grants are OR-ed together; there are no deny entries. An absent set
/// (permissions not loaded) fails closed. Passing `None` as the store
/// scope ignores the store constraint entirely; callers that want the
/// current-store default resolve it before calling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator<'a> {
    permissions: Option<&'a PermissionSet>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator bound to `permissions`.
    pub fn new(permissions: Option<&'a PermissionSet>) -> Self {
        Self { permissions }
    }

    fn entries(&self) -> &'a [Permission] {
        self.permissions.map(PermissionSet::entries).unwrap_or(&[])
    }

    /// Returns whether `action` on `resource` is granted in `store`.
    pub fn has_permission(&self, resource: Resource, action: Action, store: Option<&StoreId>) -> bool {
        self.entries().iter().any(|entry| {
            entry.resource() == resource && entry.applies_to(store) && entry.grants(action)
        })
    }

    /// Returns whether at least one of `actions` is granted.
    pub fn has_any_permission(
        &self,
        resource: Resource,
        actions: &[Action],
        store: Option<&StoreId>,
    ) -> bool {
        actions
            .iter()
            .any(|action| self.has_permission(resource, *action, store))
    }

    /// Returns whether every one of `actions` is granted.
    ///
    /// An empty list adds no constraint and is granted, unless the
    /// permission set is absent or empty.
    pub fn has_all_permissions(
        &self,
        resource: Resource,
        actions: &[Action],
        store: Option<&StoreId>,
    ) -> bool {
        if self.entries().is_empty() {
            return false;
        }
        actions
            .iter()
            .all(|action| self.has_permission(resource, *action, store))
    }

    /// Returns the de-duplicated actions granted on `resource`.
    pub fn resource_permissions(
        &self,
        resource: Resource,
        store: Option<&StoreId>,
    ) -> BTreeSet<ActionGrant> {
        self.entries()
            .iter()
            .filter(|entry| entry.resource() == resource && entry.applies_to(store))
            .flat_map(|entry| entry.actions().iter().copied())
            .collect()
    }

    /// Returns every store named by a store-scoped entry.
    pub fn user_stores(&self) -> BTreeSet<StoreId> {
        self.entries()
            .iter()
            .filter_map(|entry| entry.store_id().cloned())
            .collect()
    }

    /// Returns whether any entry reaches `store`; global entries reach all stores.
    pub fn can_access_store(&self, store: &StoreId) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.store_id().is_none_or(|granted| granted == store))
    }

    /// Returns whether a global wildcard or `manage` grant exists.
    pub fn is_super_admin(&self) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.is_global() && entry.grants(Action::Manage))
    }

    /// Returns [`Decision`] for a single check.
    pub fn decide(&self, resource: Resource, action: Action, store: Option<&StoreId>) -> Decision {
        Decision::from(self.has_permission(resource, action, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store(value: &str) -> StoreId {
        StoreId::try_from(value).unwrap()
    }

    fn grant(resource: Resource, actions: &[ActionGrant], store_id: Option<&str>) -> Permission {
        Permission::new(resource, actions.iter().copied(), store_id.map(store)).unwrap()
    }

    fn read() -> ActionGrant {
        ActionGrant::Action(Action::Read)
    }

    #[test]
    fn store_scoped_entry_matches_only_its_store_or_no_scope() {
        let set = PermissionSet::new(vec![grant(Resource::Inventory, &[read()], Some("s1"))]);
        let evaluator = Evaluator::new(Some(&set));

        assert!(!evaluator.has_permission(Resource::Inventory, Action::Read, Some(&store("s2"))));
        assert!(evaluator.has_permission(Resource::Inventory, Action::Read, Some(&store("s1"))));
        assert!(evaluator.has_permission(Resource::Inventory, Action::Read, None));
    }

    #[test]
    fn global_entry_satisfies_any_store_scope() {
        let set = PermissionSet::new(vec![grant(
            Resource::Sales,
            &[ActionGrant::Action(Action::Manage)],
            None,
        )]);
        let evaluator = Evaluator::new(Some(&set));

        assert!(evaluator.has_permission(Resource::Sales, Action::Manage, Some(&store("anyStoreId"))));
        assert!(!evaluator.has_permission(Resource::Sales, Action::Read, None));
        assert!(!evaluator.has_permission(Resource::Inventory, Action::Manage, None));
    }

    #[test]
    fn absent_set_fails_closed() {
        let evaluator = Evaluator::new(None);

        assert!(!evaluator.has_permission(Resource::Sales, Action::Read, None));
        assert!(!evaluator.has_any_permission(Resource::Sales, &[Action::Read], None));
        assert!(!evaluator.has_all_permissions(Resource::Sales, &[], None));
        assert!(!evaluator.is_super_admin());
        assert!(evaluator.resource_permissions(Resource::Sales, None).is_empty());
        assert!(evaluator.user_stores().is_empty());
        assert!(!evaluator.can_access_store(&store("s1")));
        assert_eq!(evaluator.decide(Resource::Sales, Action::Read, None), Decision::Deny);
    }

    #[test]
    fn all_permissions_with_empty_list_is_vacuously_true() {
        let set = PermissionSet::new(vec![grant(Resource::Report, &[read()], None)]);
        let evaluator = Evaluator::new(Some(&set));

        assert!(evaluator.has_all_permissions(Resource::Report, &[], None));
        assert!(evaluator.has_all_permissions(Resource::Customer, &[], Some(&store("s9"))));
    }

    #[test]
    fn any_and_all_combine_single_checks() {
        let set = PermissionSet::new(vec![
            grant(Resource::Invoice, &[read()], Some("s1")),
            grant(Resource::Invoice, &[ActionGrant::Action(Action::Export)], None),
        ]);
        let evaluator = Evaluator::new(Some(&set));
        let s1 = store("s1");
        let s2 = store("s2");

        assert!(evaluator.has_any_permission(Resource::Invoice, &[Action::Delete, Action::Read], Some(&s1)));
        assert!(!evaluator.has_any_permission(Resource::Invoice, &[Action::Delete, Action::Read], Some(&s2)));
        assert!(evaluator.has_all_permissions(Resource::Invoice, &[Action::Export, Action::Read], Some(&s1)));
        assert!(!evaluator.has_all_permissions(Resource::Invoice, &[Action::Export, Action::Read], Some(&s2)));
        assert!(!evaluator.has_any_permission(Resource::Invoice, &[], Some(&s1)));
    }

    #[test]
    fn resource_permissions_are_deduplicated() {
        let set = PermissionSet::new(vec![
            grant(Resource::Customer, &[read()], Some("s1")),
            grant(Resource::Customer, &[read(), ActionGrant::Action(Action::Update)], Some("s1")),
            grant(Resource::Customer, &[ActionGrant::Action(Action::Delete)], Some("s2")),
        ]);
        let evaluator = Evaluator::new(Some(&set));
        let s1 = store("s1");

        let actions = evaluator.resource_permissions(Resource::Customer, Some(&s1));
        assert_eq!(
            actions.into_iter().collect::<Vec<_>>(),
            vec![read(), ActionGrant::Action(Action::Update)]
        );
        assert_eq!(evaluator.resource_permissions(Resource::Customer, None).len(), 3);
    }

    #[test]
    fn user_stores_lists_distinct_scoped_stores() {
        let set = PermissionSet::new(vec![
            grant(Resource::Sales, &[read()], Some("s2")),
            grant(Resource::Inventory, &[read()], Some("s1")),
            grant(Resource::Customer, &[read()], Some("s2")),
            grant(Resource::Report, &[read()], None),
        ]);
        let stores = Evaluator::new(Some(&set)).user_stores();

        assert_eq!(stores.into_iter().collect::<Vec<_>>(), vec![store("s1"), store("s2")]);
    }

    #[test]
    fn can_access_store_via_scoped_or_global_entry() {
        let scoped = PermissionSet::new(vec![grant(Resource::Sales, &[read()], Some("s1"))]);
        let evaluator = Evaluator::new(Some(&scoped));
        assert!(evaluator.can_access_store(&store("s1")));
        assert!(!evaluator.can_access_store(&store("s2")));

        let global = PermissionSet::new(vec![grant(Resource::Sales, &[read()], None)]);
        assert!(Evaluator::new(Some(&global)).can_access_store(&store("s2")));
    }

    #[test]
    fn super_admin_requires_global_manage_or_wildcard() {
        let scoped = PermissionSet::new(vec![grant(Resource::Store, &[ActionGrant::All], Some("s1"))]);
        assert!(!Evaluator::new(Some(&scoped)).is_super_admin());

        let manage = PermissionSet::new(vec![grant(
            Resource::Store,
            &[ActionGrant::Action(Action::Manage)],
            None,
        )]);
        assert!(Evaluator::new(Some(&manage)).is_super_admin());

        let wildcard = PermissionSet::new(vec![grant(Resource::User, &[ActionGrant::All], None)]);
        assert!(Evaluator::new(Some(&wildcard)).is_super_admin());

        let read_only = PermissionSet::new(vec![grant(Resource::User, &[read()], None)]);
        assert!(!Evaluator::new(Some(&read_only)).is_super_admin());
    }

    fn any_resource() -> impl Strategy<Value = Resource> {
        prop::sample::select(Resource::ALL)
    }

    fn any_action() -> impl Strategy<Value = Action> {
        prop::sample::select(Action::ALL)
    }

    proptest! {
        #[test]
        fn global_wildcard_grants_every_action_in_every_store(
            resource in any_resource(),
            action in any_action(),
            store_name in "[a-z0-9_]{1,12}",
            scoped in any::<bool>(),
        ) {
            let set = PermissionSet::new(vec![grant(resource, &[ActionGrant::All], None)]);
            let evaluator = Evaluator::new(Some(&set));
            let requested = store(&store_name);
            let scope = if scoped { Some(&requested) } else { None };

            prop_assert!(evaluator.has_permission(resource, action, scope));
        }

        #[test]
        fn empty_set_denies_everything(
            resource in any_resource(),
            actions in prop::collection::vec(any_action(), 0..4),
        ) {
            let empty = PermissionSet::default();
            for evaluator in [Evaluator::new(Some(&empty)), Evaluator::new(None)] {
                for action in &actions {
                    prop_assert!(!evaluator.has_permission(resource, *action, None));
                }
                prop_assert!(!evaluator.has_any_permission(resource, &actions, None));
                prop_assert!(!evaluator.has_all_permissions(resource, &actions, None));
                prop_assert!(!evaluator.is_super_admin());
            }
        }
    }
}
