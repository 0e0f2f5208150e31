//! Account Service
//!
//! Registration, login, confirmation, password reset, email change and
//! admin account edits. Operations that need an emailed link return an
//! [`IssuedToken`]; delivering it is up to the caller.

use std::sync::{Arc, LazyLock};

use serde::Deserialize;
use tracing::{info, warn};
use validator::{Validate, ValidateEmail};

use super::error::{AuthError, AuthResult};
use super::jwt::{TokenIntent, TokenService};
use super::password::hash_password;
use super::principal::Principal;
use crate::config::Config;
use crate::db::{Account, AccountId, AccountStore, NewAccount, RoleStore};
use crate::permissions::{assign_role, Permission, Role, RoleId, StoreRoleResolver};
use crate::util::avatar_hash;

/// Letters first, then letters, digits, dots or underscores.
static USERNAME_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").unwrap());

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Registration request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Username (3-64 characters, starts with a letter).
    #[validate(length(min = 3, max = 64), regex(path = *USERNAME_REGEX))]
    pub username: String,
    /// Email address.
    #[validate(email, length(max = 64))]
    pub email: String,
    /// Password (8-128 characters).
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Profile fields an account may change on itself.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 3, max = 64), regex(path = *USERNAME_REGEX))]
    pub username: String,
    #[validate(length(max = 128))]
    pub location: Option<String>,
    pub about_me: Option<String>,
}

/// Fields an administrator may overwrite on any account.
///
/// The role is set directly; the registration role rule is not reapplied.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminAccountEdit {
    #[validate(length(min = 1, max = 64), regex(path = *USERNAME_REGEX))]
    pub username: String,
    #[validate(email, length(min = 1, max = 64))]
    pub email: String,
    #[validate(length(max = 64))]
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub confirmed: bool,
    pub role_id: Option<RoleId>,
}

/// A freshly minted link token and where it should be sent.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Address the link must be delivered to.
    pub recipient: String,
    pub purpose: TokenIntent,
    pub token: String,
}

fn validate_password(password: &str) -> AuthResult<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// ============================================================================
// Service
// ============================================================================

/// Account operations over a role and account store.
pub struct AccountService<S> {
    store: Arc<S>,
    tokens: TokenService,
    admin_email: Option<String>,
}

impl<S> Clone for AccountService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tokens: self.tokens.clone(),
            admin_email: self.admin_email.clone(),
        }
    }
}

impl<S> AccountService<S>
where
    S: AccountStore + RoleStore,
{
    pub const fn new(store: Arc<S>, tokens: TokenService, admin_email: Option<String>) -> Self {
        Self {
            store,
            tokens,
            admin_email,
        }
    }

    pub fn from_config(store: Arc<S>, config: &Config) -> Self {
        Self::new(
            store,
            TokenService::from_config(config),
            config.admin_email.clone(),
        )
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn load(&self, id: AccountId) -> AuthResult<Account> {
        self.store
            .find_account_by_id(id)?
            .ok_or(AuthError::UserNotFound)
    }

    fn save(&self, account: &Account) -> AuthResult<()> {
        self.store
            .save_account(account)
            .map_err(AuthError::from_account_write)
    }

    /// Resolve the session's account id into a principal.
    ///
    /// A missing or deleted account is anonymous.
    pub fn load_principal(&self, account_id: Option<AccountId>) -> AuthResult<Principal> {
        let Some(id) = account_id else {
            return Ok(Principal::Anonymous);
        };
        Ok(Principal::from(self.store.find_account_by_id(id)?))
    }

    /// Fail with [`AuthError::Forbidden`] unless `principal` holds `permission`.
    pub fn require_permission(&self, principal: &Principal, permission: Permission) -> AuthResult<()> {
        if principal.can(permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// Persist a new account.
    ///
    /// Without an explicit role the account gets the administrator role if
    /// its email is the configured admin email, else the default role. The
    /// avatar hash is derived from the email when not supplied.
    pub fn create_account(&self, mut account: NewAccount) -> AuthResult<Account> {
        if account.role.is_none() {
            let resolver = StoreRoleResolver::new(self.store.as_ref(), self.admin_email.as_deref());
            account.role = assign_role(&account.email, &resolver);
        }
        if account.avatar_hash.is_none() && !account.email.is_empty() {
            account.avatar_hash = Some(avatar_hash(&account.email));
        }

        let account = self
            .store
            .insert_account(account)
            .map_err(AuthError::from_account_write)?;

        match &account.role {
            Some(role) => info!(account_id = account.id, role = %role.name, "Account created"),
            None => warn!(account_id = account.id, "Account created without a role"),
        }
        Ok(account)
    }

    /// Register a new account and issue its confirmation token.
    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    pub fn register(&self, request: RegisterRequest) -> AuthResult<(Account, IssuedToken)> {
        request
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        if self.store.find_account_by_username(&request.username)?.is_some()
            || self.store.find_account_by_email(&request.email)?.is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&request.password).map_err(|_| AuthError::PasswordHash)?;

        let account = self.create_account(NewAccount {
            username: request.username,
            email: request.email,
            password_hash,
            ..NewAccount::default()
        })?;

        let token = self.confirmation_token(&account)?;
        Ok((account, token))
    }

    /// Check credentials and record the visit.
    #[tracing::instrument(skip(self, password))]
    pub fn authenticate(&self, email: &str, password: &str) -> AuthResult<Account> {
        let mut account = self
            .store
            .find_account_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !account.verify_password(password) {
            return Err(AuthError::InvalidCredentials);
        }

        account.ping();
        self.save(&account)?;
        Ok(account)
    }

    /// Record activity for a signed-in account.
    pub fn ping(&self, account_id: AccountId) -> AuthResult<()> {
        let mut account = self.load(account_id)?;
        account.ping();
        self.save(&account)
    }

    fn confirmation_token(&self, account: &Account) -> AuthResult<IssuedToken> {
        Ok(IssuedToken {
            recipient: account.email.clone(),
            purpose: TokenIntent::Confirm,
            token: self.tokens.issue_confirmation(account.id)?,
        })
    }

    /// Confirm an account with a `confirm` token.
    ///
    /// An already-confirmed account returns `true` without looking at the
    /// token. Returns `false` if the token is invalid, expired or was issued
    /// for another account.
    #[tracing::instrument(skip(self, token))]
    pub fn confirm(&self, account_id: AccountId, token: &str) -> AuthResult<bool> {
        let mut account = self.load(account_id)?;
        if account.confirmed {
            return Ok(true);
        }
        if !account.confirm(&self.tokens, token) {
            return Ok(false);
        }

        self.save(&account)?;
        info!(account_id, "Account confirmed");
        Ok(true)
    }

    /// Issue a fresh confirmation token.
    pub fn resend_confirmation(&self, account_id: AccountId) -> AuthResult<IssuedToken> {
        let account = self.load(account_id)?;
        self.confirmation_token(&account)
    }

    /// Issue a password reset token for the account owning `email`.
    #[tracing::instrument(skip(self))]
    pub fn forgot_password(&self, email: &str) -> AuthResult<IssuedToken> {
        let account = self
            .store
            .find_account_by_email(email)?
            .ok_or(AuthError::UserNotFound)?;

        Ok(IssuedToken {
            recipient: account.email.clone(),
            purpose: TokenIntent::ResetPassword,
            token: self.tokens.issue_password_reset(&account.email)?,
        })
    }

    /// Overwrite the password of the account named by a reset token.
    ///
    /// Returns `false` if the token is invalid or expired or its account no
    /// longer exists. The token is not consumed; every redemption within its
    /// lifetime rehashes the password.
    #[tracing::instrument(skip(self, token, new_password))]
    pub fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<bool> {
        validate_password(new_password)?;

        let Some(email) = self.tokens.password_reset_email(token) else {
            return Ok(false);
        };
        let Some(mut account) = self.store.find_account_by_email(&email)? else {
            return Ok(false);
        };

        account.set_password(new_password)?;
        self.save(&account)?;
        info!(account_id = account.id, "Password reset");
        Ok(true)
    }

    /// Set a new password for a signed-in account.
    #[tracing::instrument(skip(self, new_password))]
    pub fn change_password(&self, account_id: AccountId, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;

        let mut account = self.load(account_id)?;
        account.set_password(new_password)?;
        self.save(&account)
    }

    /// Issue an email-change token, sent to the account's current address.
    #[tracing::instrument(skip(self))]
    pub fn request_email_change(
        &self,
        account_id: AccountId,
        new_email: &str,
    ) -> AuthResult<IssuedToken> {
        if !new_email.validate_email() {
            return Err(AuthError::Validation("email: invalid address".into()));
        }
        if self.store.find_account_by_email(new_email)?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let account = self.load(account_id)?;
        Ok(IssuedToken {
            recipient: account.email,
            purpose: TokenIntent::UpdateEmail,
            token: self.tokens.issue_email_update(new_email)?,
        })
    }

    /// Apply an `update-email` token to a signed-in account.
    ///
    /// Returns `false` for an invalid or expired token. Re-applying the same
    /// token sets the same address again.
    #[tracing::instrument(skip(self, token))]
    pub fn update_email(&self, account_id: AccountId, token: &str) -> AuthResult<bool> {
        let mut account = self.load(account_id)?;
        if !account.apply_email_update(&self.tokens, token) {
            return Ok(false);
        }

        self.save(&account)?;
        info!(account_id, "Email updated");
        Ok(true)
    }

    /// Update username, location and about text.
    pub fn update_profile(&self, account_id: AccountId, update: ProfileUpdate) -> AuthResult<Account> {
        update
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let mut account = self.load(account_id)?;
        if update.username != account.username
            && self.store.find_account_by_username(&update.username)?.is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        account.username = update.username;
        account.location = update.location;
        account.about_me = update.about_me;
        self.save(&account)?;
        Ok(account)
    }

    /// Delete an account.
    #[tracing::instrument(skip(self))]
    pub fn delete_account(&self, account_id: AccountId) -> AuthResult<()> {
        if !self.store.delete_account(account_id)? {
            return Err(AuthError::UserNotFound);
        }
        info!(account_id, "Account deleted");
        Ok(())
    }

    /// Overwrite another account's details. Requires [`Permission::ADMIN`].
    #[tracing::instrument(skip(self, actor, edit), fields(actor = ?actor.account_id()))]
    pub fn admin_edit_account(
        &self,
        actor: &Principal,
        username: &str,
        edit: AdminAccountEdit,
    ) -> AuthResult<Account> {
        self.require_permission(actor, Permission::ADMIN)?;
        edit.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let mut account = self
            .store
            .find_account_by_username(username)?
            .ok_or(AuthError::UserNotFound)?;

        let role = match edit.role_id {
            Some(id) => Some(
                self.store
                    .find_role_by_id(id)?
                    .ok_or_else(|| AuthError::NotFound(format!("role {id}")))?,
            ),
            None => None,
        };

        if edit.email != account.email {
            account.set_email(edit.email);
        }
        account.username = edit.username;
        account.location = edit.location;
        account.about_me = edit.about_me;
        account.confirmed = edit.confirmed;
        account.role = role;

        self.save(&account)?;
        info!(
            account_id = account.id,
            role = account.role.as_ref().map(|r| r.name.as_str()),
            "Account edited by administrator"
        );
        Ok(account)
    }

    /// Grant a permission to a role. Requires [`Permission::ADMIN`].
    pub fn grant_permission(
        &self,
        actor: &Principal,
        role_name: &str,
        permission: Permission,
    ) -> AuthResult<Role> {
        self.update_role(actor, role_name, |role| role.add_permission(permission))
    }

    /// Revoke a permission from a role. Requires [`Permission::ADMIN`].
    pub fn revoke_permission(
        &self,
        actor: &Principal,
        role_name: &str,
        permission: Permission,
    ) -> AuthResult<Role> {
        self.update_role(actor, role_name, |role| role.remove_permission(permission))
    }

    fn update_role(
        &self,
        actor: &Principal,
        role_name: &str,
        apply: impl FnOnce(&mut Role),
    ) -> AuthResult<Role> {
        self.require_permission(actor, Permission::ADMIN)?;

        let mut role = self
            .store
            .find_role_by_name(role_name)?
            .ok_or_else(|| AuthError::NotFound(format!("role {role_name}")))?;
        apply(&mut role);

        let role = self.store.upsert_role(role)?;
        info!(
            role = %role.name,
            permissions = role.permissions.to_db(),
            "Role permissions changed"
        );
        Ok(role)
    }
}
