//! Reusable test helpers for account service tests.
//!
//! Provides a service over a fresh [`MemoryStore`] seeded with the built-in
//! role table, plus shortcuts for registering accounts.
#![allow(dead_code)]

use std::sync::Arc;

use inkwell_server::auth::{AccountService, IssuedToken, RegisterRequest};
use inkwell_server::config::Config;
use inkwell_server::db::{Account, MemoryStore};
use inkwell_server::permissions::{set_roles, RoleTable};

/// Admin email configured by [`Config::default_for_test`].
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Password used by [`register`].
pub const PASSWORD: &str = "correct horse battery";

/// Service over a fresh store with the built-in roles.
pub fn service() -> AccountService<MemoryStore> {
    let config = Config::default_for_test();
    let store = Arc::new(MemoryStore::new());
    set_roles(store.as_ref(), &RoleTable::builtin()).expect("Role bootstrap should succeed");
    AccountService::from_config(store, &config)
}

/// Registration request with the shared test password.
pub fn request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.into(),
        email: email.into(),
        password: PASSWORD.into(),
    }
}

/// Register an account, returning it with its confirmation token.
pub fn register(
    service: &AccountService<MemoryStore>,
    username: &str,
    email: &str,
) -> (Account, IssuedToken) {
    service
        .register(request(username, email))
        .expect("Registration should succeed")
}
