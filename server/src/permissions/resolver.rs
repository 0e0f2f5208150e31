//! Role assignment for new accounts.
//!
//! Assignment order:
//! 1. The configured administrator email gets the `administrator` role
//! 2. Everyone else gets the role flagged default
//! 3. If neither role exists the account is left without a role

use tracing::warn;

use super::role::{Role, ADMINISTRATOR_ROLE};
use crate::db::RoleStore;

/// Source of the roles used during account creation.
pub trait RoleResolver {
    /// Role flagged default, if any.
    fn default_role(&self) -> Option<Role>;

    /// Role reserved for this email address, if any.
    fn role_for_email(&self, email: &str) -> Option<Role>;
}

/// Pick the role for a new account that was created without one.
///
/// Falls back to the default role when the email has no reserved role or the
/// reserved role does not exist.
pub fn assign_role<R>(email: &str, resolver: &R) -> Option<Role>
where
    R: RoleResolver + ?Sized,
{
    resolver
        .role_for_email(email)
        .or_else(|| resolver.default_role())
}

/// Resolver reading roles from a [`RoleStore`].
///
/// The administrator email comes from configuration at construction time.
pub struct StoreRoleResolver<'a, S: ?Sized> {
    store: &'a S,
    admin_email: Option<&'a str>,
}

impl<'a, S: RoleStore + ?Sized> StoreRoleResolver<'a, S> {
    pub const fn new(store: &'a S, admin_email: Option<&'a str>) -> Self {
        Self { store, admin_email }
    }
}

impl<S: RoleStore + ?Sized> RoleResolver for StoreRoleResolver<'_, S> {
    fn default_role(&self) -> Option<Role> {
        self.store.find_default_role().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load default role");
            None
        })
    }

    fn role_for_email(&self, email: &str) -> Option<Role> {
        // Byte-for-byte, like the store's unique email index
        if self.admin_email? != email {
            return None;
        }
        self.store
            .find_role_by_name(ADMINISTRATOR_ROLE)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load administrator role");
                None
            })
    }
}
