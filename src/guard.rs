//! Render and enable decisions for permission-gated UI.
//!
//! Nothing here draws anything: a [`Guard`] picks which of the caller's
//! slots to show, and an [`ActionControl`] says whether a control is
//! hidden, disabled or enabled and runs its action.

use crate::context::{Snapshot, Status};
use crate::permission::{Action, Resource};
use crate::types::StoreId;

/// Tooltip shown on disabled controls unless overridden.
pub const DEFAULT_DENIED_TOOLTIP: &str = "You don't have permission to perform this action";

/// Which actions a requirement needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCheck {
    /// One action.
    Single(Action),
    /// At least one of the actions.
    Any(Vec<Action>),
    /// Every one of the actions.
    All(Vec<Action>),
}

impl AccessCheck {
    fn actions(&self) -> &[Action] {
        match self {
            Self::Single(action) => std::slice::from_ref(action),
            Self::Any(actions) | Self::All(actions) => actions,
        }
    }
}

/// Resource, actions and store scope a gated element needs.
///
/// Scope resolution: an explicit store wins; otherwise, when
/// `respect_current_store` is on (the default), the selected store is
/// used; otherwise the check is unscoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    resource: Resource,
    check: AccessCheck,
    store: Option<StoreId>,
    respect_current_store: bool,
}

impl Requirement {
    /// Requires `action` on `resource`.
    pub fn new(resource: Resource, action: Action) -> Self {
        Self::with_check(resource, AccessCheck::Single(action))
    }

    /// Requires at least one of `actions` on `resource`.
    pub fn any(resource: Resource, actions: impl Into<Vec<Action>>) -> Self {
        Self::with_check(resource, AccessCheck::Any(actions.into()))
    }

    /// Requires every one of `actions` on `resource`.
    pub fn all(resource: Resource, actions: impl Into<Vec<Action>>) -> Self {
        Self::with_check(resource, AccessCheck::All(actions.into()))
    }

    fn with_check(resource: Resource, check: AccessCheck) -> Self {
        Self {
            resource,
            check,
            store: None,
            respect_current_store: true,
        }
    }

    /// Pins the check to `store`.
    pub fn store(mut self, store: StoreId) -> Self {
        self.store = Some(store);
        self
    }

    /// Enables or disables falling back to the selected store.
    pub fn respect_current_store(mut self, on: bool) -> Self {
        self.respect_current_store = on;
        self
    }

    /// Returns the resource.
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Returns the access check.
    pub fn check(&self) -> &AccessCheck {
        &self.check
    }

    /// Returns the store scope the check runs with.
    pub fn scope<'a>(&'a self, snapshot: &'a Snapshot) -> Option<&'a StoreId> {
        match &self.store {
            Some(store) => Some(store),
            None if self.respect_current_store => snapshot.current_store(),
            None => None,
        }
    }

    /// Returns whether `snapshot` satisfies the requirement.
    pub fn allows(&self, snapshot: &Snapshot) -> bool {
        let scope = self.scope(snapshot);
        match &self.check {
            AccessCheck::Single(action) => snapshot.has_permission(self.resource, *action, scope),
            AccessCheck::Any(actions) => snapshot.has_any_permission(self.resource, actions, scope),
            AccessCheck::All(actions) => {
                snapshot.has_all_permissions(self.resource, actions, scope)
            }
        }
    }
}

/// What a guard decided to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Permissions are loading; show the loading placeholder.
    Loading,
    /// Loading failed and the guard displays errors.
    Error(String),
    /// Show the children.
    Granted,
    /// Show the fallback.
    Denied,
}

/// Content a guard chooses from. Unset slots render nothing.
#[derive(Debug, Clone)]
pub struct GuardSlots<T> {
    /// Shown when access is granted.
    pub children: T,
    /// Shown when access is denied.
    pub fallback: Option<T>,
    /// Shown while permissions are loading.
    pub loading: Option<T>,
    /// Shown when loading failed and the guard displays errors.
    pub error: Option<T>,
}

impl<T> GuardSlots<T> {
    /// Creates slots with only children set.
    pub fn new(children: T) -> Self {
        Self {
            children,
            fallback: None,
            loading: None,
            error: None,
        }
    }

    /// Sets the content shown when access is denied.
    pub fn fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Sets the content shown while permissions load.
    pub fn loading(mut self, loading: T) -> Self {
        self.loading = Some(loading);
        self
    }

    /// Sets the content shown when loading failed.
    pub fn error(mut self, error: T) -> Self {
        self.error = Some(error);
        self
    }
}

/// Conditionally renders children based on a [`Requirement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    requirement: Requirement,
    show_error: bool,
}

impl Guard {
    /// Creates a guard for `requirement`.
    pub fn new(requirement: Requirement) -> Self {
        Self {
            requirement,
            show_error: false,
        }
    }

    /// Shows the error slot instead of evaluating when loading failed.
    pub fn show_error(mut self, on: bool) -> Self {
        self.show_error = on;
        self
    }

    /// Returns the requirement.
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Decides what to show for `snapshot`.
    pub fn decide(&self, snapshot: &Snapshot) -> GuardOutcome {
        match snapshot.status() {
            Status::Loading => return GuardOutcome::Loading,
            Status::Errored if self.show_error => {
                let message = snapshot.error().unwrap_or("Failed to load permissions");
                return GuardOutcome::Error(message.to_string());
            }
            _ => {}
        }
        if self.requirement.allows(snapshot) {
            GuardOutcome::Granted
        } else {
            GuardOutcome::Denied
        }
    }

    /// Picks the slot to render; `None` renders nothing.
    pub fn render<T>(&self, snapshot: &Snapshot, slots: GuardSlots<T>) -> Option<T> {
        match self.decide(snapshot) {
            GuardOutcome::Loading => slots.loading,
            GuardOutcome::Error(_) => slots.error,
            GuardOutcome::Granted => Some(slots.children),
            GuardOutcome::Denied => slots.fallback,
        }
    }
}

/// How a control reacts to denied access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeniedBehavior {
    /// Do not render the control.
    #[default]
    Hide,
    /// Render the control disabled with a tooltip.
    Disable,
}

/// Presentation state of a gated control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    /// Not rendered at all.
    Hidden,
    /// Rendered but inert, explaining why on hover.
    Disabled { tooltip: String },
    /// Rendered and clickable.
    Enabled,
}

/// Result of activating a gated control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation<R> {
    /// The action ran.
    Performed(R),
    /// Access was denied; the action did not run.
    Denied,
    /// The user declined the confirmation prompt.
    Declined,
}

/// Blocking confirmation prompt.
pub trait Confirm {
    /// Asks the user to confirm `message`.
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

/// Permission-aware button or menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionControl {
    label: String,
    requirement: Requirement,
    denied: DeniedBehavior,
    tooltip: Option<String>,
    confirmation: Option<String>,
    audit: bool,
}

impl ActionControl {
    /// Creates a control labelled `label`, hidden when denied.
    pub fn new(label: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            label: label.into(),
            requirement,
            denied: DeniedBehavior::Hide,
            tooltip: None,
            confirmation: None,
            audit: false,
        }
    }

    /// Sets the reaction to denied access.
    pub fn when_denied(mut self, behavior: DeniedBehavior) -> Self {
        self.denied = behavior;
        self
    }

    /// Overrides the disabled-state tooltip.
    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Requires confirming `message` before the action runs.
    pub fn confirm_with(mut self, message: impl Into<String>) -> Self {
        self.confirmation = Some(message.into());
        self
    }

    /// Emits an audit event on every activation.
    pub fn audit(mut self, on: bool) -> Self {
        self.audit = on;
        self
    }

    /// Returns the label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the requirement.
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Returns how the control should be presented.
    pub fn state(&self, snapshot: &Snapshot) -> ControlState {
        if self.requirement.allows(snapshot) {
            return ControlState::Enabled;
        }
        match self.denied {
            DeniedBehavior::Hide => ControlState::Hidden,
            DeniedBehavior::Disable => ControlState::Disabled {
                tooltip: self
                    .tooltip
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DENIED_TOOLTIP.to_string()),
            },
        }
    }

    /// Runs `action` if access is granted and any confirmation is accepted.
    pub fn activate<R>(
        &self,
        snapshot: &Snapshot,
        confirm: &dyn Confirm,
        action: impl FnOnce() -> R,
    ) -> Activation<R> {
        let outcome = if !self.requirement.allows(snapshot) {
            Activation::Denied
        } else if self
            .confirmation
            .as_deref()
            .is_some_and(|message| !confirm.confirm(message))
        {
            Activation::Declined
        } else {
            Activation::Performed(action())
        };

        if self.audit {
            let result = match &outcome {
                Activation::Performed(_) => "performed",
                Activation::Denied => "denied",
                Activation::Declined => "declined",
            };
            tracing::info!(
                target: "console_access::audit",
                label = %self.label,
                resource = %self.requirement.resource(),
                actions = ?self.requirement.check().actions(),
                store = ?self.requirement.scope(snapshot),
                user = ?snapshot.user().map(|user| user.id.as_str()),
                result,
                "gated action"
            );
        }
        outcome
    }
}
