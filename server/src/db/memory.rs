//! In-memory store backed by `DashMap`.
//!
//! Mirrors the relational layout: accounts keep a `role_id` and the role is
//! joined in on read. Unique username/email/role-name constraints are held in
//! index maps whose `entry` API makes the uniqueness check atomic per key.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Account, AccountId, AccountStore, NewAccount, RoleStore, StoreError, StoreResult};
use crate::permissions::{Role, RoleId};

/// Stored account row.
#[derive(Debug, Clone)]
struct AccountRow {
    id: AccountId,
    username: String,
    email: String,
    confirmed: bool,
    password_hash: String,
    avatar_hash: Option<String>,
    role_id: Option<RoleId>,
    location: Option<String>,
    about_me: Option<String>,
    member_since: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Thread-safe in-memory role and account store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    roles: DashMap<RoleId, Role>,
    role_names: DashMap<String, RoleId>,
    accounts: DashMap<AccountId, AccountRow>,
    emails: DashMap<String, AccountId>,
    usernames: DashMap<String, AccountId>,
    next_role_id: AtomicI64,
    next_account_id: AtomicI64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn hydrate(&self, row: &AccountRow) -> Account {
        Account {
            id: row.id,
            username: row.username.clone(),
            email: row.email.clone(),
            confirmed: row.confirmed,
            password_hash: row.password_hash.clone(),
            avatar_hash: row.avatar_hash.clone(),
            role: row
                .role_id
                .and_then(|id| self.roles.get(&id).map(|r| r.value().clone())),
            location: row.location.clone(),
            about_me: row.about_me.clone(),
            member_since: row.member_since,
            last_seen: row.last_seen,
        }
    }

    /// Claim `key` in a unique index for `id`.
    ///
    /// Succeeds if the key is free or already owned by `id`; returns whether
    /// the claim is new.
    fn claim(
        index: &DashMap<String, AccountId>,
        key: &str,
        id: AccountId,
        column: &str,
    ) -> StoreResult<bool> {
        match index.entry(key.to_string()) {
            Entry::Occupied(e) if *e.get() != id => {
                Err(StoreError::Conflict(format!("{column} '{key}' already taken")))
            }
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(e) => {
                e.insert(id);
                Ok(true)
            }
        }
    }

    /// Release `key` if it is still owned by `id`.
    fn release(index: &DashMap<String, AccountId>, key: &str, id: AccountId) {
        index.remove_if(key, |_, owner| *owner == id);
    }

    fn claim_account_keys(&self, id: AccountId, username: &str, email: &str) -> StoreResult<()> {
        let new_email = Self::claim(&self.emails, email, id, "email")?;
        if let Err(e) = Self::claim(&self.usernames, username, id, "username") {
            if new_email {
                Self::release(&self.emails, email, id);
            }
            return Err(e);
        }
        Ok(())
    }
}

impl RoleStore for MemoryStore {
    fn find_role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.roles.get(&id).map(|r| r.value().clone()))
    }

    fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let Some(id) = self.role_names.get(name).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.find_role_by_id(id)
    }

    fn find_default_role(&self) -> StoreResult<Option<Role>> {
        Ok(self
            .list_roles()?
            .into_iter()
            .find(|role| role.is_default))
    }

    fn upsert_role(&self, mut role: Role) -> StoreResult<Role> {
        let id = *self
            .role_names
            .entry(role.name.clone())
            .or_insert_with(|| self.next_role_id.fetch_add(1, Ordering::SeqCst) + 1);
        role.id = id;
        self.roles.insert(id, role.clone());
        Ok(role)
    }

    fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.iter().map(|r| r.value().clone()).collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }
}

impl AccountStore for MemoryStore {
    fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        let id = self.next_account_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.claim_account_keys(id, &account.username, &account.email)?;

        let now = Utc::now();
        let row = AccountRow {
            id,
            username: account.username,
            email: account.email,
            confirmed: account.confirmed,
            password_hash: account.password_hash,
            avatar_hash: account.avatar_hash,
            role_id: account.role.map(|r| r.id),
            location: account.location,
            about_me: account.about_me,
            member_since: now,
            last_seen: now,
        };
        let stored = self.hydrate(&row);
        self.accounts.insert(id, row);
        Ok(stored)
    }

    fn save_account(&self, account: &Account) -> StoreResult<()> {
        let (old_username, old_email) = match self.accounts.get(&account.id) {
            Some(row) => (row.username.clone(), row.email.clone()),
            None => return Err(StoreError::Missing(format!("account {}", account.id))),
        };

        self.claim_account_keys(account.id, &account.username, &account.email)?;
        if old_email != account.email {
            Self::release(&self.emails, &old_email, account.id);
        }
        if old_username != account.username {
            Self::release(&self.usernames, &old_username, account.id);
        }

        let row = AccountRow {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            confirmed: account.confirmed,
            password_hash: account.password_hash.clone(),
            avatar_hash: account.avatar_hash.clone(),
            role_id: account.role.as_ref().map(|r| r.id),
            location: account.location.clone(),
            about_me: account.about_me.clone(),
            member_since: account.member_since,
            last_seen: account.last_seen,
        };
        self.accounts.insert(account.id, row);
        Ok(())
    }

    fn find_account_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.get(&id).map(|row| self.hydrate(row.value())))
    }

    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let Some(id) = self.emails.get(email).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.find_account_by_id(id)
    }

    fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let Some(id) = self.usernames.get(username).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.find_account_by_id(id)
    }

    fn delete_account(&self, id: AccountId) -> StoreResult<bool> {
        let Some((_, row)) = self.accounts.remove(&id) else {
            return Ok(false);
        };
        Self::release(&self.emails, &row.email, id);
        Self::release(&self.usernames, &row.username, id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Permission;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.into(),
            email: email.into(),
            ..NewAccount::default()
        }
    }

    #[test]
    fn test_upsert_role_keeps_id_by_name() {
        let store = MemoryStore::new();
        let first = store.upsert_role(Role::new("user")).unwrap();

        let mut updated = Role::new("user");
        updated.add_permission(Permission::WRITE);
        let second = store.upsert_role(updated).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list_roles().unwrap().len(), 1);
        assert!(store
            .find_role_by_name("user")
            .unwrap()
            .unwrap()
            .has_permission(Permission::WRITE));
    }

    #[test]
    fn test_find_default_role() {
        let store = MemoryStore::new();
        store.upsert_role(Role::new("a")).unwrap();
        assert!(store.find_default_role().unwrap().is_none());

        let mut b = Role::new("b");
        b.is_default = true;
        store.upsert_role(b).unwrap();
        assert_eq!(store.find_default_role().unwrap().unwrap().name, "b");
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.insert_account(new_account("a", "a@example.com")).unwrap();
        let b = store.insert_account(new_account("b", "b@example.com")).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.account_count(), 2);
    }

    #[test]
    fn test_insert_rejects_duplicate_email_and_username() {
        let store = MemoryStore::new();
        store.insert_account(new_account("a", "a@example.com")).unwrap();

        let dup_email = store.insert_account(new_account("b", "a@example.com"));
        assert!(matches!(dup_email, Err(StoreError::Conflict(_))));

        let dup_name = store.insert_account(new_account("a", "c@example.com"));
        assert!(matches!(dup_name, Err(StoreError::Conflict(_))));

        // The failed username claim must not leave its email reserved
        assert!(store.find_account_by_email("c@example.com").unwrap().is_none());
        store.insert_account(new_account("c", "c@example.com")).unwrap();
    }

    #[test]
    fn test_role_is_joined_on_read() {
        let store = MemoryStore::new();
        let role = store.upsert_role(Role::new("user")).unwrap();
        let mut account = new_account("a", "a@example.com");
        account.role = Some(role);
        let stored = store.insert_account(account).unwrap();

        let mut granted = Role::new("user");
        granted.add_permission(Permission::COMMENT);
        store.upsert_role(granted).unwrap();

        let loaded = store.find_account_by_id(stored.id).unwrap().unwrap();
        assert!(loaded.can(Permission::COMMENT));
    }

    #[test]
    fn test_save_reindexes_email() {
        let store = MemoryStore::new();
        let mut account = store.insert_account(new_account("a", "old@example.com")).unwrap();
        account.email = "new@example.com".into();
        store.save_account(&account).unwrap();

        assert!(store.find_account_by_email("old@example.com").unwrap().is_none());
        assert_eq!(
            store.find_account_by_email("new@example.com").unwrap().unwrap().id,
            account.id
        );
    }

    #[test]
    fn test_save_rejects_taken_email() {
        let store = MemoryStore::new();
        store.insert_account(new_account("a", "a@example.com")).unwrap();
        let mut b = store.insert_account(new_account("b", "b@example.com")).unwrap();
        b.email = "a@example.com".into();

        assert!(matches!(store.save_account(&b), Err(StoreError::Conflict(_))));
        assert_eq!(
            store.find_account_by_email("b@example.com").unwrap().unwrap().id,
            b.id
        );
    }

    #[test]
    fn test_delete_releases_unique_keys() {
        let store = MemoryStore::new();
        let a = store.insert_account(new_account("a", "a@example.com")).unwrap();
        assert!(store.delete_account(a.id).unwrap());
        assert!(!store.delete_account(a.id).unwrap());
        store.insert_account(new_account("a", "a@example.com")).unwrap();
    }
}
