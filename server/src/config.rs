//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::auth::jwt::DEFAULT_TOKEN_EXPIRY;
use crate::permissions::RoleTable;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HMAC secret signing link tokens. Rotating it invalidates every
    /// outstanding token.
    pub secret_key: String,

    /// Email address that receives the administrator role on registration
    pub admin_email: Option<String>,

    /// Link token lifetime in seconds (default: 600 = 10 min)
    pub token_expiry: i64,

    /// JSON role table (optional, built-in table if unset)
    pub roles_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let secret_key = env::var("SECRET_KEY").context("SECRET_KEY must be set")?;
        if secret_key.trim().is_empty() {
            anyhow::bail!("SECRET_KEY must not be empty");
        }

        Ok(Self {
            secret_key,
            admin_email: env::var("APP_ADMIN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            token_expiry: env::var("TOKEN_EXPIRY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_EXPIRY),
            roles_file: Self::roles_file_from_env(),
        })
    }

    /// Role table to bootstrap: the configured file, or the built-in table.
    pub fn role_table(&self) -> Result<RoleTable> {
        load_role_table(self.roles_file.as_deref())
    }

    /// `ROLES_FILE` alone, for commands that never sign tokens.
    #[must_use]
    pub fn roles_file_from_env() -> Option<PathBuf> {
        env::var_os("ROLES_FILE").map(PathBuf::from)
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            secret_key: "test-secret".into(),
            admin_email: Some("admin@example.com".into()),
            token_expiry: DEFAULT_TOKEN_EXPIRY,
            roles_file: None,
        }
    }
}

/// Load the role table from `path`, or fall back to the built-in table.
pub fn load_role_table(path: Option<&Path>) -> Result<RoleTable> {
    match path {
        Some(path) => RoleTable::load(path)
            .with_context(|| format!("Failed to load role table from {}", path.display())),
        None => Ok(RoleTable::builtin()),
    }
}
