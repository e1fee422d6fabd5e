use crate::error::{Error, Result};
use crate::types::StoreId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Wire token granting every action on a resource.
pub const WILDCARD: &str = "*";

macro_rules! define_vocabulary {
    ($(#[$doc:meta])* $name:ident, $kind:expr, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub enum $name {
            $(
                #[doc = concat!("`", $wire, "`")]
                $variant,
            )+
        }

        impl $name {
            /// Every member of the vocabulary, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the wire name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Parses a wire name; input is trimmed and lowercased.
            pub fn parse(value: &str) -> Result<Self> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(Error::InvalidPermission(format!(
                        "unknown {}: {other:?}",
                        $kind
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::parse(value)
            }
        }

        impl Serialize for $name {
            fn serialize<Ser: serde::Serializer>(
                &self,
                serializer: Ser,
            ) -> std::result::Result<Ser::Ok, Ser::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_vocabulary!(
    /// Resource category subject to access control.
    Resource, "resource", {
        Inventory => "inventory",
        Sales => "sales",
        Customer => "customer",
        Employee => "employee",
        Store => "store",
        Supplier => "supplier",
        Expense => "expense",
        Invoice => "invoice",
        Return => "return",
        Role => "role",
        Tax => "tax",
        User => "user",
        Permission => "permission",
        Report => "report",
    }
);

define_vocabulary!(
    /// Operation performable on a resource.
    Action, "action", {
        Create => "create",
        Read => "read",
        Update => "update",
        Delete => "delete",
        Export => "export",
        Import => "import",
        Manage => "manage",
        Approve => "approve",
        Reject => "reject",
        Process => "process",
        ViewAll => "view_all",
        Assign => "assign",
        Revoke => "revoke",
    }
);

/// A single granted action, or the wildcard.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ActionGrant {
    /// Every action (`*`).
    All,
    /// One named action.
    Action(Action),
}

impl ActionGrant {
    /// Parses an action name or the wildcard token.
    pub fn parse(value: &str) -> Result<Self> {
        if value.trim() == WILDCARD {
            return Ok(Self::All);
        }
        Action::parse(value).map(Self::Action)
    }

    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => WILDCARD,
            Self::Action(action) => action.as_str(),
        }
    }
}

impl From<Action> for ActionGrant {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl fmt::Display for ActionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission entry exactly as the remote API returns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPermission {
    pub resource: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub store_id: Option<String>,
}

impl RawPermission {
    /// Decodes JSON entries one at a time, dropping any whose shape does not
    /// match (a `null` action list, a numeric store id, ...).
    pub fn decode_each(values: Vec<serde_json::Value>) -> Vec<Self> {
        values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(index, error = %err, "dropping permission entry with invalid shape");
                    None
                }
            })
            .collect()
    }
}

/// Validated permission grant.
///
/// `store_id == None` is a global grant covering every store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPermission", into = "RawPermission")]
pub struct Permission {
    resource: Resource,
    actions: BTreeSet<ActionGrant>,
    store_id: Option<StoreId>,
}

impl Permission {
    /// Creates a grant of `actions` on `resource`, optionally scoped to a store.
    pub fn new(
        resource: Resource,
        actions: impl IntoIterator<Item = ActionGrant>,
        store_id: Option<StoreId>,
    ) -> Result<Self> {
        let actions: BTreeSet<ActionGrant> = actions.into_iter().collect();
        if actions.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must grant at least one action".to_string(),
            ));
        }
        Ok(Self {
            resource,
            actions,
            store_id,
        })
    }

    /// Returns the resource this entry applies to.
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Returns the granted actions.
    pub fn actions(&self) -> &BTreeSet<ActionGrant> {
        &self.actions
    }

    /// Returns the store scope, `None` for global grants.
    pub fn store_id(&self) -> Option<&StoreId> {
        self.store_id.as_ref()
    }

    /// Returns whether this entry is global.
    pub fn is_global(&self) -> bool {
        self.store_id.is_none()
    }

    /// Returns whether this entry contains the wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.actions.contains(&ActionGrant::All)
    }

    pub(crate) fn grants(&self, action: Action) -> bool {
        self.is_wildcard() || self.actions.contains(&ActionGrant::Action(action))
    }

    /// `None` requested scope ignores the entry's store entirely.
    pub(crate) fn applies_to(&self, store: Option<&StoreId>) -> bool {
        match (store, &self.store_id) {
            (None, _) | (_, None) => true,
            (Some(requested), Some(granted)) => requested == granted,
        }
    }
}

impl TryFrom<RawPermission> for Permission {
    type Error = Error;

    fn try_from(raw: RawPermission) -> Result<Self> {
        let resource = Resource::parse(&raw.resource)?;
        let actions = raw
            .actions
            .iter()
            .map(|action| ActionGrant::parse(action))
            .collect::<Result<Vec<_>>>()?;
        let store_id = match raw.store_id.as_deref() {
            None => None,
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(StoreId::new(value)?),
        };
        Self::new(resource, actions, store_id)
    }
}

impl From<Permission> for RawPermission {
    fn from(permission: Permission) -> Self {
        Self {
            resource: permission.resource.as_str().to_string(),
            actions: permission
                .actions
                .iter()
                .map(|grant| grant.as_str().to_string())
                .collect(),
            store_id: permission.store_id.map(|store| store.as_str().to_string()),
        }
    }
}

/// Ordered permission list owned by one authenticated session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    entries: Vec<Permission>,
}

impl PermissionSet {
    /// Creates a set from validated entries.
    pub fn new(entries: Vec<Permission>) -> Self {
        Self { entries }
    }

    /// Validates raw API entries, dropping malformed ones.
    pub fn from_raw(raw: Vec<RawPermission>) -> Self {
        let mut entries = Vec::with_capacity(raw.len());
        for (index, entry) in raw.into_iter().enumerate() {
            let resource = entry.resource.clone();
            match Permission::try_from(entry) {
                Ok(permission) => entries.push(permission),
                Err(err) => {
                    tracing::warn!(index, %resource, error = %err, "dropping malformed permission entry");
                }
            }
        }
        Self { entries }
    }

    /// Returns the entries in API order.
    pub fn entries(&self) -> &[Permission] {
        &self.entries
    }

    /// Returns `true` when no entry is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Converts back to the wire representation.
    pub fn to_raw(&self) -> Vec<RawPermission> {
        self.entries.iter().cloned().map(RawPermission::from).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
