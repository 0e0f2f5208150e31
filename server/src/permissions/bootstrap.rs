//! Role bootstrap.
//!
//! Roles are created once at setup from a name -> permissions table. Running
//! the bootstrap again updates roles in place, so it doubles as the migration
//! step when the table changes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::flags::Permission;
use super::role::{Role, ADMINISTRATOR_ROLE};
use crate::db::{RoleStore, StoreError};

/// Name of the built-in default role.
pub const DEFAULT_ROLE: &str = "user";

/// Bootstrap failures. All of them are fatal at setup time.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A role lists a permission name that does not exist.
    #[error("Role '{role}' lists unknown permission '{permission}'")]
    UnknownPermission { role: String, permission: String },

    /// The default role is not part of the table.
    #[error("Default role '{0}' is not defined in the role table")]
    UnknownDefaultRole(String),

    /// The same role name appears twice.
    #[error("Role '{0}' is defined more than once")]
    DuplicateRole(String),

    /// The table document could not be parsed.
    #[error("Malformed role table: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The table file could not be read.
    #[error("Failed to read role table: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a role failed.
    #[error("Failed to store role: {0}")]
    Store(#[from] StoreError),
}

/// Role table as written in a JSON bootstrap file.
#[derive(Debug, Deserialize)]
struct RoleTableDocument {
    default: String,
    roles: BTreeMap<String, Vec<String>>,
}

/// Validated role table: role names with their permission masks and the
/// name of the default role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTable {
    roles: Vec<(String, Permission)>,
    default_role: String,
}

impl RoleTable {
    /// Build a table, checking that names are unique and the default exists.
    pub fn new<I, N>(roles: I, default_role: impl Into<String>) -> Result<Self, BootstrapError>
    where
        I: IntoIterator<Item = (N, Permission)>,
        N: Into<String>,
    {
        let mut entries: Vec<(String, Permission)> = Vec::new();
        for (name, perms) in roles {
            let name = name.into();
            if entries.iter().any(|(existing, _)| *existing == name) {
                return Err(BootstrapError::DuplicateRole(name));
            }
            entries.push((name, perms));
        }

        let default_role = default_role.into();
        if !entries.iter().any(|(name, _)| *name == default_role) {
            return Err(BootstrapError::UnknownDefaultRole(default_role));
        }

        Ok(Self {
            roles: entries,
            default_role,
        })
    }

    /// The built-in table: `user` (default), `moderator`, `administrator`.
    #[must_use]
    pub fn builtin() -> Self {
        let user = Permission::COMMENT | Permission::WRITE;
        let moderator = user | Permission::MODERATE;
        let administrator = moderator | Permission::ADMIN;
        Self {
            roles: vec![
                (DEFAULT_ROLE.to_string(), user),
                ("moderator".to_string(), moderator),
                (ADMINISTRATOR_ROLE.to_string(), administrator),
            ],
            default_role: DEFAULT_ROLE.to_string(),
        }
    }

    /// Parse a JSON table of the form
    /// `{"default": "user", "roles": {"user": ["comment", "write"]}}`.
    pub fn from_json(json: &str) -> Result<Self, BootstrapError> {
        let doc: RoleTableDocument = serde_json::from_str(json)?;

        let mut roles = Vec::with_capacity(doc.roles.len());
        for (role, names) in doc.roles {
            let mut mask = Permission::empty();
            for name in names {
                let perm = Permission::parse(&name).ok_or_else(|| {
                    BootstrapError::UnknownPermission {
                        role: role.clone(),
                        permission: name.clone(),
                    }
                })?;
                mask |= perm;
            }
            roles.push((role, mask));
        }

        Self::new(roles, doc.default)
    }

    /// Read and parse a JSON table file.
    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Role names and masks in table order.
    #[must_use]
    pub fn roles(&self) -> &[(String, Permission)] {
        &self.roles
    }

    #[must_use]
    pub fn default_role(&self) -> &str {
        &self.default_role
    }
}

/// Create or update every role in `table`.
///
/// Each role's mask is replaced by the table's and exactly the table's
/// default role ends up flagged default. Roles outside the table are left
/// untouched. Safe to run repeatedly.
pub fn set_roles<S>(store: &S, table: &RoleTable) -> Result<Vec<Role>, BootstrapError>
where
    S: RoleStore + ?Sized,
{
    let mut stored = Vec::with_capacity(table.roles.len());
    for (name, perms) in &table.roles {
        let mut role = store
            .find_role_by_name(name)?
            .unwrap_or_else(|| Role::new(name.clone()));
        role.reset_permissions();
        role.add_permission(*perms);
        role.is_default = *name == table.default_role;

        let role = store.upsert_role(role)?;
        info!(
            role = %role.name,
            permissions = role.permissions.to_db(),
            is_default = role.is_default,
            "Role bootstrapped"
        );
        stored.push(role);
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn two_role_table() -> RoleTable {
        RoleTable::new(
            [
                ("role_1", Permission::WRITE),
                ("role_2", Permission::WRITE | Permission::MODERATE),
            ],
            "role_1",
        )
        .unwrap()
    }

    #[test]
    fn test_set_roles_creates_table() {
        let store = MemoryStore::new();
        set_roles(&store, &two_role_table()).unwrap();

        let roles = store.list_roles().unwrap();
        assert_eq!(roles.len(), 2);

        let role_1 = store.find_role_by_name("role_1").unwrap().unwrap();
        let role_2 = store.find_role_by_name("role_2").unwrap().unwrap();

        assert!(role_1.is_default);
        assert!(role_1.has_permission(Permission::WRITE));
        assert!(!role_1.has_permission(Permission::MODERATE));

        assert!(!role_2.is_default);
        assert!(role_2.has_permission(Permission::WRITE));
        assert!(role_2.has_permission(Permission::MODERATE));
        assert!(!role_2.has_permission(Permission::COMMENT));
    }

    #[test]
    fn test_set_roles_is_idempotent() {
        let store = MemoryStore::new();
        let first = set_roles(&store, &two_role_table()).unwrap();
        let second = set_roles(&store, &two_role_table()).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_roles().unwrap().len(), 2);
    }

    #[test]
    fn test_set_roles_moves_default_and_replaces_masks() {
        let store = MemoryStore::new();
        set_roles(&store, &two_role_table()).unwrap();

        let moved = RoleTable::new(
            [
                ("role_1", Permission::COMMENT),
                ("role_2", Permission::WRITE),
            ],
            "role_2",
        )
        .unwrap();
        set_roles(&store, &moved).unwrap();

        let role_1 = store.find_role_by_name("role_1").unwrap().unwrap();
        let role_2 = store.find_role_by_name("role_2").unwrap().unwrap();
        assert!(!role_1.is_default);
        assert_eq!(role_1.permissions, Permission::COMMENT);
        assert!(role_2.is_default);
        assert_eq!(role_2.permissions, Permission::WRITE);
        assert_eq!(store.find_default_role().unwrap().unwrap().name, "role_2");
    }

    #[test]
    fn test_builtin_table() {
        let table = RoleTable::builtin();
        assert_eq!(table.default_role(), "user");

        let store = MemoryStore::new();
        set_roles(&store, &table).unwrap();

        let user = store.find_default_role().unwrap().unwrap();
        assert_eq!(user.name, "user");
        assert!(user.has_permission(Permission::WRITE));
        assert!(!user.has_permission(Permission::MODERATE));

        let admin = store.find_role_by_name(ADMINISTRATOR_ROLE).unwrap().unwrap();
        for perm in Permission::ALL {
            assert!(admin.has_permission(perm));
        }
    }

    #[test]
    fn test_new_rejects_missing_default() {
        let result = RoleTable::new([("a", Permission::WRITE)], "b");
        assert!(matches!(result, Err(BootstrapError::UnknownDefaultRole(name)) if name == "b"));
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let result = RoleTable::new([("a", Permission::WRITE), ("a", Permission::COMMENT)], "a");
        assert!(matches!(result, Err(BootstrapError::DuplicateRole(_))));
    }

    #[test]
    fn test_from_json() {
        let table = RoleTable::from_json(
            r#"{"default": "reader", "roles": {"reader": ["comment"], "editor": ["comment", "write", "moderate"]}}"#,
        )
        .unwrap();

        assert_eq!(table.default_role(), "reader");
        let editor = table
            .roles()
            .iter()
            .find(|(name, _)| name == "editor")
            .map(|(_, perms)| *perms)
            .unwrap();
        assert_eq!(
            editor,
            Permission::COMMENT | Permission::WRITE | Permission::MODERATE
        );
    }

    #[test]
    fn test_from_json_empty_permission_list() {
        let table = RoleTable::from_json(r#"{"default": "guest", "roles": {"guest": []}}"#).unwrap();
        assert_eq!(table.roles()[0].1, Permission::empty());
    }

    #[test]
    fn test_from_json_rejects_unknown_permission() {
        let result = RoleTable::from_json(r#"{"default": "a", "roles": {"a": ["follow"]}}"#);
        assert!(matches!(
            result,
            Err(BootstrapError::UnknownPermission { ref permission, .. }) if permission == "follow"
        ));
    }

    #[test]
    fn test_from_json_rejects_malformed_document() {
        let result = RoleTable::from_json(r#"{"roles": ["user"]}"#);
        assert!(matches!(result, Err(BootstrapError::Malformed(_))));
    }
}
