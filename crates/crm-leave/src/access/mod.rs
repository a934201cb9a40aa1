//! Role catalog and the identity/organisation seams consumed by the leave workflow.

mod catalog;
mod directory;

pub use catalog::{resolve_permissions, Permission, Role, RoleCatalog};
pub use directory::{
    Directory, DirectoryTeam, DirectoryUser, IdentityError, IdentityProvider, OrgDirectory,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for CRM users.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}
