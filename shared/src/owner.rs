//! Cart ownership
//!
//! A cart belongs to exactly one identity: a registered user or an
//! anonymous guest session. Modeling this as a sum type makes the
//! "both set" and "neither set" states unrepresentable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cart owner identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Owner {
    /// Registered user id
    User(String),
    /// Anonymous guest session id
    Guest(String),
}

impl Owner {
    /// The raw identity string, regardless of kind
    pub fn id(&self) -> &str {
        match self {
            Owner::User(id) | Owner::Guest(id) => id,
        }
    }

    /// Unique key for the cart owner index
    ///
    /// The `user:`/`guest:` prefix keeps the two id spaces from colliding.
    pub fn storage_key(&self) -> String {
        match self {
            Owner::User(id) => format!("user:{id}"),
            Owner::Guest(id) => format!("guest:{id}"),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
