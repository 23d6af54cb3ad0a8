//! Actor identity, bearer-token authentication and the transition capability
//! checks the workflow engine consults before mutating a remark.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::config::{AccessConfig, ActorConfig};
use crate::records::RecordId;
use crate::workflows::Stage;

/// Authenticated identity performing a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May transition and reopen terminal remarks.
    Admin,
    /// May transition non-terminal remarks.
    Editor,
    /// Read-only.
    Viewer,
}

/// Capability checks the engine depends on but does not implement.
pub trait AccessPolicy: Send + Sync {
    /// Whether `actor` may move `record_id` from `from` (absent for a record
    /// with no remark yet) to `to`.
    fn can_transition(
        &self,
        actor: &Actor,
        record_id: RecordId,
        from: Option<&Stage>,
        to: &Stage,
    ) -> bool;

    /// Whether `actor` may move a remark out of a terminal stage.
    fn can_override_terminal(&self, actor: &Actor, record_id: RecordId) -> bool;
}

/// Policy backed by the configured actor roles. Unknown actors get nothing.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    roles: HashMap<String, Role>,
}

impl RolePolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            roles: config
                .actors
                .iter()
                .map(|actor| (actor.name.clone(), actor.role))
                .collect(),
        }
    }

    pub fn role_of(&self, actor: &Actor) -> Option<Role> {
        self.roles.get(actor.name()).copied()
    }
}

impl AccessPolicy for RolePolicy {
    fn can_transition(
        &self,
        actor: &Actor,
        record_id: RecordId,
        _from: Option<&Stage>,
        to: &Stage,
    ) -> bool {
        let allowed = matches!(self.role_of(actor), Some(Role::Admin | Role::Editor));
        if !allowed {
            debug!(actor = %actor, record_id, to = %to, "transition denied by role policy");
        }
        allowed
    }

    fn can_override_terminal(&self, actor: &Actor, _record_id: RecordId) -> bool {
        self.role_of(actor) == Some(Role::Admin)
    }
}

/// Lets every actor transition. Used for local operator commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPolicy {
    allow_override: bool,
}

impl OpenPolicy {
    pub fn new(allow_override: bool) -> Self {
        Self { allow_override }
    }
}

impl AccessPolicy for OpenPolicy {
    fn can_transition(&self, _: &Actor, _: RecordId, _: Option<&Stage>, _: &Stage) -> bool {
        true
    }

    fn can_override_terminal(&self, _: &Actor, _: RecordId) -> bool {
        self.allow_override
    }
}

/// Maps bearer tokens to configured actors.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, Actor>,
}

impl TokenAuthenticator {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            tokens: config
                .actors
                .iter()
                .filter(|actor| !actor.token.is_empty())
                .map(|ActorConfig { name, token, .. }| (token.clone(), Actor::new(name.clone())))
                .collect(),
        }
    }

    /// Resolve an `Authorization` header value.
    pub fn authenticate(&self, header: &str) -> Option<Actor> {
        let token = header.strip_prefix("Bearer ")?.trim();
        self.tokens.get(token).cloned()
    }
}
