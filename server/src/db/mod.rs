//! Persistence Layer
//!
//! Role and account storage traits. A relational backend implements these
//! with one row per role and per account; [`MemoryStore`] keeps everything
//! in concurrent maps and backs tests and the bootstrap command.

mod memory;
mod models;

pub use memory::MemoryStore;
pub use models::*;

use thiserror::Error;

use crate::permissions::{Role, RoleId};

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column (username, email, role name) is already taken.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// The row being saved no longer exists.
    #[error("Row not found: {0}")]
    Missing(String),

    /// Backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Role persistence.
pub trait RoleStore: Send + Sync {
    /// Look up a role by id.
    fn find_role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>>;

    /// Look up a role by its unique name.
    fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    /// First role flagged default, if any.
    fn find_default_role(&self) -> StoreResult<Option<Role>>;

    /// Insert or update a role keyed by name, returning the stored row.
    ///
    /// An existing role keeps its id; `role.id` is ignored.
    fn upsert_role(&self, role: Role) -> StoreResult<Role>;

    /// All roles ordered by id.
    fn list_roles(&self) -> StoreResult<Vec<Role>>;
}

/// Account persistence.
///
/// Accounts are returned with their role joined in, so a role edit is
/// visible on the next load.
pub trait AccountStore: Send + Sync {
    /// Insert a new account and assign it an id.
    fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;

    /// Overwrite a stored account (last write wins).
    fn save_account(&self, account: &Account) -> StoreResult<()>;

    fn find_account_by_id(&self, id: AccountId) -> StoreResult<Option<Account>>;

    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    /// Delete an account. Returns `false` if it did not exist.
    fn delete_account(&self, id: AccountId) -> StoreResult<bool>;
}
