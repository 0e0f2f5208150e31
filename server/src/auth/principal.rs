//! Request principal.

use crate::db::{Account, AccountId};
use crate::permissions::Permission;

/// Caller of an operation: a loaded account, or nobody.
///
/// Anonymous callers never hold a role, so every capability check fails.
#[derive(Debug, Clone, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    Account(Box<Account>),
}

impl Principal {
    /// Check whether the caller holds `permission`.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        match self {
            Self::Anonymous => false,
            Self::Account(account) => account.can(permission),
        }
    }

    /// Check for administrator access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.can(Permission::ADMIN)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Account(_))
    }

    #[must_use]
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Anonymous => None,
            Self::Account(account) => Some(&**account),
        }
    }

    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        self.account().map(|a| a.id)
    }
}

impl From<Account> for Principal {
    fn from(account: Account) -> Self {
        Self::Account(Box::new(account))
    }
}

impl From<Option<Account>> for Principal {
    fn from(account: Option<Account>) -> Self {
        account.map_or(Self::Anonymous, Self::from)
    }
}
