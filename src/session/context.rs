//! Session identity
//!
//! Identity and role are attached by the admission layer before a session is
//! registered and never change for the lifetime of the session.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Opaque handle of a registered session, allocated by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    /// Raw numeric value, for logging
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access role of a connected user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrators receive system-wide statistics
    Admin,
    /// Regular account
    User,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(Error::InvalidRole(s.to_string())),
        }
    }
}

/// Who is on the other end of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Account identifier
    pub user_id: String,
    /// Account role
    pub role: Role,
}

impl Identity {
    /// Create a new identity
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Read-only information about a registered session
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Hub-assigned handle
    pub id: SessionId,

    /// Identity attached at admission
    pub identity: Identity,

    /// When the session was registered
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a new context
    pub fn new(id: SessionId, identity: Identity) -> Self {
        Self {
            id,
            identity,
            connected_at: Instant::now(),
        }
    }

    /// User the session belongs to
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// Role of the session's user
    pub fn role(&self) -> Role {
        self.identity.role
    }

    /// Time since registration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
