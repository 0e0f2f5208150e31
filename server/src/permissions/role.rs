//! Role model and permission grants.

use serde::{Deserialize, Serialize};

use super::flags::Permission;

/// Role identifier as stored.
pub type RoleId = i64;

/// Name of the role granted to the configured administrator email.
pub const ADMINISTRATOR_ROLE: &str = "administrator";

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Store-assigned identifier; `0` until the role is first persisted.
    pub id: RoleId,
    pub name: String,
    pub permissions: Permission,
    /// Auto-assigned to new accounts. At most one role should carry it.
    pub is_default: bool,
}

impl Role {
    /// Create an unsaved role with no permissions.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            permissions: Permission::empty(),
            is_default: false,
        }
    }

    /// Check whether every bit of `permission` is granted.
    ///
    /// # Examples
    ///
    /// ```
    /// use inkwell_server::permissions::{Permission, Role};
    ///
    /// let mut role = Role::new("writer");
    /// role.add_permission(Permission::WRITE);
    /// assert!(role.has_permission(Permission::WRITE));
    /// assert!(!role.has_permission(Permission::MODERATE));
    /// ```
    #[must_use]
    pub const fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Grant `permission`. Granting twice leaves the mask unchanged.
    pub fn add_permission(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    /// Revoke `permission`. Revoking an absent permission is a no-op.
    pub fn remove_permission(&mut self, permission: Permission) {
        self.permissions.remove(permission);
    }

    /// Clear every permission.
    pub fn reset_permissions(&mut self) {
        self.permissions = Permission::empty();
    }
}
