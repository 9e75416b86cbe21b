//! Session-visible identity and its state machine.
//!
//! # State Transitions
//! ```text
//! Anonymous → Loading: login / fetch_identity starts
//! Loading → Authenticated: success
//! Loading → Anonymous: failure
//! Authenticated → Refreshing: identity call hit an expired credential
//! Refreshing → Authenticated: refresh succeeded
//! Refreshing → Anonymous: refresh failed
//! Authenticated/Anonymous → Anonymous: logout
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of storefront roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unauthenticated visitor.
    #[default]
    Guest,
    Customer,
    Admin,
}

impl Role {
    /// Role claimed by a user profile. Missing or unknown roles map to `Customer`.
    pub fn from_profile(user: &Value) -> Self {
        match user.get("role").and_then(Value::as_str) {
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            Some(r) if r.eq_ignore_ascii_case("guest") => Role::Guest,
            _ => Role::Customer,
        }
    }
}

/// The user/role pair. Fields are private so the two can only change together.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Identity {
    user: Option<Value>,
    role: Role,
}

impl Identity {
    /// Nobody logged in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Identity for a fetched user profile; role derived from the profile.
    pub fn authenticated(user: Value) -> Self {
        let role = Role::from_profile(&user);
        Self { user: Some(user), role }
    }

    pub fn user(&self) -> Option<&Value> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    #[default]
    Anonymous,
    Loading,
    Authenticated,
    Refreshing,
}

/// What subscribers observe: state and identity, always published together.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub identity: Identity,
}

impl SessionSnapshot {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            state: SessionState::Authenticated,
            identity,
        }
    }
}
