//! Resourceful action classification and the per-request active action.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// The seven resourceful actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Index,
    Show,
    New,
    Create,
    Edit,
    Update,
    Destroy,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Index,
        ActionKind::Show,
        ActionKind::New,
        ActionKind::Create,
        ActionKind::Edit,
        ActionKind::Update,
        ActionKind::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Index => "index",
            ActionKind::Show => "show",
            ActionKind::New => "new",
            ActionKind::Create => "create",
            ActionKind::Edit => "edit",
            ActionKind::Update => "update",
            ActionKind::Destroy => "destroy",
        }
    }

    /// Recognises an action name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<ActionKind> {
        let name = name.trim();
        ActionKind::ALL.into_iter().find(|k| k.as_str().eq_ignore_ascii_case(name))
    }

    pub fn is_read(&self) -> bool {
        matches!(self, ActionKind::Index | ActionKind::Show)
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ActionKind::New | ActionKind::Create | ActionKind::Edit | ActionKind::Update
        )
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ActionKind::Destroy)
    }

    /// Actions that change stored records.
    pub fn is_mutation(&self) -> bool {
        matches!(self, ActionKind::Create | ActionKind::Update | ActionKind::Destroy)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the action was inferred from the route or pinned by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Default,
    Explicit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Action {
    pub kind: ActionKind,
    pub origin: Origin,
}

impl Action {
    pub fn default_for(kind: ActionKind) -> Self {
        Action {
            kind,
            origin: Origin::Default,
        }
    }

    pub fn explicit(kind: ActionKind) -> Self {
        Action {
            kind,
            origin: Origin::Explicit,
        }
    }

    pub fn is(&self, kind: ActionKind) -> bool {
        self.kind == kind
    }

    pub fn is_explicit(&self) -> bool {
        self.origin == Origin::Explicit
    }

    pub fn is_read(&self) -> bool {
        self.kind.is_read()
    }

    pub fn is_write(&self) -> bool {
        self.kind.is_write()
    }

    pub fn is_delete(&self) -> bool {
        self.kind.is_delete()
    }
}

/// Builds the action for a request. Missing or unrecognised names fall back to `default_kind`.
pub fn classify(default_kind: ActionKind, requested_name: Option<&str>) -> Action {
    match requested_name.and_then(ActionKind::parse) {
        Some(kind) => Action::explicit(kind),
        None => {
            if let Some(name) = requested_name {
                tracing::debug!(name = %name, fallback = %default_kind, "unrecognised action name");
            }
            Action::default_for(default_kind)
        }
    }
}

/// Classifies a request arriving on a route whose own action is `native`.
/// A requested name may swap one rendering action for another, but never selects a
/// mutation the route does not perform, nor replaces the route's own mutation.
pub fn classify_on_route(native: ActionKind, requested_name: Option<&str>) -> Action {
    let action = classify(native, requested_name);
    if action.kind != native && (action.kind.is_mutation() || native.is_mutation()) {
        tracing::warn!(requested = %action.kind, route = %native, "action override rejected");
        return Action::default_for(native);
    }
    action
}

/// Holds the single active action of one request.
#[derive(Debug)]
pub struct ActionContext {
    current: Action,
}

impl ActionContext {
    pub fn new(action: Action) -> Self {
        ActionContext { current: action }
    }

    pub fn current(&self) -> &Action {
        &self.current
    }

    /// Runs `body` with the active action pinned to an explicit `kind`.
    /// The previous action is restored when `body` returns or unwinds.
    pub fn with_action<R>(&mut self, kind: ActionKind, body: impl FnOnce(&mut ActionContext) -> R) -> R {
        let mut guard = ActionOverride::enter(self, Action::explicit(kind));
        body(&mut guard)
    }
}

/// Restores the overridden action on drop.
struct ActionOverride<'a> {
    ctx: &'a mut ActionContext,
    previous: Action,
}

impl<'a> ActionOverride<'a> {
    fn enter(ctx: &'a mut ActionContext, action: Action) -> Self {
        let previous = std::mem::replace(&mut ctx.current, action);
        ActionOverride { ctx, previous }
    }
}

impl Deref for ActionOverride<'_> {
    type Target = ActionContext;

    fn deref(&self) -> &ActionContext {
        self.ctx
    }
}

impl DerefMut for ActionOverride<'_> {
    fn deref_mut(&mut self) -> &mut ActionContext {
        self.ctx
    }
}

impl Drop for ActionOverride<'_> {
    fn drop(&mut self) {
        self.ctx.current = self.previous;
    }
}
