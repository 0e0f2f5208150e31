//! Authentication Service
//!
//! Password hashing, signed link tokens, capability checks and the account
//! lifecycle built on them.

mod error;
pub mod jwt;
pub mod password;
mod principal;
mod service;

pub use error::{AuthError, AuthResult};
pub use jwt::{TokenIntent, TokenService, DEFAULT_TOKEN_EXPIRY};
pub use password::{hash_password, verify_password};
pub use principal::Principal;
pub use service::{
    AccountService, AdminAccountEdit, IssuedToken, ProfileUpdate, RegisterRequest,
};
