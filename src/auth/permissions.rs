//! Account roles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role attached to every account. Ordered so `Admin` satisfies any
/// `User` requirement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Role granted at signup. Usernames starting with "admin" become admins.
    pub fn for_new_username(username: &str) -> Self {
        if username.to_lowercase().starts_with("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Whether this role meets `required`
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}
