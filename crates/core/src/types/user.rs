//! Session user persisted under the `user` storage key.

use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::status::Role;

/// The logged-in user as returned by `auth-login`.
///
/// Written once at login and read-only afterwards. No stored user means the
/// shopper is a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
