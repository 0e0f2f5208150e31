//! Account models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::jwt::TokenService;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, AuthResult};
use crate::permissions::{Permission, Role};
use crate::util::{avatar_hash, gravatar_url};

/// Account identifier as stored.
pub type AccountId = i64;

/// Account record with its role joined in.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    /// Argon2id PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar_hash: Option<String>,
    pub role: Option<Role>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Insert payload for a new account.
///
/// `role` is the explicitly requested role; when `None` the account service
/// resolves one from the admin email and the default role.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_hash: Option<String>,
    pub role: Option<Role>,
    pub confirmed: bool,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

impl Account {
    /// Check whether the account's role grants `permission`.
    ///
    /// An account without a role is denied everything.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.role
            .as_ref()
            .is_some_and(|role| role.has_permission(permission))
    }

    /// Check for administrator access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.can(Permission::ADMIN)
    }

    /// Replace the stored password hash with a hash of `password`.
    pub fn set_password(&mut self, password: &str) -> AuthResult<()> {
        self.password_hash = hash_password(password).map_err(|_| AuthError::PasswordHash)?;
        Ok(())
    }

    /// Check `password` against the stored hash.
    ///
    /// A corrupt stored hash never verifies.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        match verify_password(password, &self.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(account_id = self.id, error = %e, "Stored password hash is unreadable");
                false
            }
        }
    }

    /// Change the email and recompute the avatar hash.
    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
        self.avatar_hash = Some(avatar_hash(&self.email));
    }

    /// Mark the account confirmed if `token` is a live `confirm` token for it.
    ///
    /// Redeeming again after confirmation succeeds and changes nothing.
    pub fn confirm(&mut self, tokens: &TokenService, token: &str) -> bool {
        match tokens.confirmation_account(token) {
            Some(id) if id == self.id => {
                self.confirmed = true;
                true
            }
            _ => false,
        }
    }

    /// Apply the new address carried by a live `update-email` token.
    pub fn apply_email_update(&mut self, tokens: &TokenService, token: &str) -> bool {
        let Some(email) = tokens.email_update_target(token) else {
            return false;
        };
        self.set_email(email);
        true
    }

    /// Update `last_seen` to now.
    pub fn ping(&mut self) {
        self.last_seen = Utc::now();
    }

    /// Gravatar image URL for this account.
    #[must_use]
    pub fn gravatar(&self, size: u32) -> String {
        let hash = self
            .avatar_hash
            .clone()
            .unwrap_or_else(|| avatar_hash(&self.email));
        gravatar_url(&hash, size, "identicon", "g")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Unsaved account with the given id and role, for model-level tests.
    pub fn account(id: AccountId, role: Option<Role>) -> Account {
        let now = Utc::now();
        Account {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            confirmed: false,
            password_hash: String::new(),
            avatar_hash: None,
            role,
            location: None,
            about_me: None,
            member_since: now,
            last_seen: now,
        }
    }
}
