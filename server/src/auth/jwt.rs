//! Signed Link Tokens
//!
//! Stateless HS256 JWTs carrying one intent (`confirm`, `email`,
//! `update-email`) plus an `exp` claim. Tokens are emailed as links and
//! redeemed later; nothing is stored server-side, so a token stays valid
//! until it expires or the secret changes.
//!
//! Redemption never reports why a token failed. Malformed input, a bad
//! signature, a foreign algorithm, expiry and a missing intent key all
//! come back as `None`; the cause is only logged at debug level.

use std::fmt;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::error::AuthResult;
use crate::config::Config;
use crate::db::AccountId;

/// Default token lifetime in seconds.
pub const DEFAULT_TOKEN_EXPIRY: i64 = 600;

/// Token payload, keyed by intent plus `exp`.
pub type Payload = Map<String, Value>;

/// What a token authorizes. Each maps to one payload key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenIntent {
    /// Confirm an account; value is the account id.
    Confirm,
    /// Reset a password; value is the account email.
    ResetPassword,
    /// Change the account email; value is the new address.
    UpdateEmail,
}

impl TokenIntent {
    /// Payload key carrying this intent's value.
    ///
    /// These names appear in links that are already in inboxes and must not
    /// change.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::ResetPassword => "email",
            Self::UpdateEmail => "update-email",
        }
    }
}

/// Issues and redeems signed link tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: i64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a service signing with `secret`.
    #[must_use]
    pub fn new(secret: &[u8], default_ttl: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            default_ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.secret_key.as_bytes(), config.token_expiry)
    }

    /// Lifetime used by the intent-specific issuers.
    #[must_use]
    pub const fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    /// Sign `payload` with an `exp` of now + `ttl_seconds`.
    ///
    /// Any `exp` already in the payload is overwritten. A negative TTL
    /// produces a token that is already expired.
    pub fn issue(&self, mut payload: Payload, ttl_seconds: i64) -> AuthResult<String> {
        let exp = Utc::now().timestamp() + ttl_seconds;
        payload.insert("exp".to_string(), Value::from(exp));
        Ok(encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)?)
    }

    /// Verify `token` and return the value under `expected_key`.
    ///
    /// Returns `None` for every failure, including a present-but-null value.
    pub fn redeem(&self, token: &str, expected_key: &str) -> Option<Value> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let mut claims = match decode::<Payload>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(reason = ?e.kind(), "Token rejected");
                return None;
            }
        };

        match claims.remove(expected_key) {
            Some(Value::Null) | None => {
                debug!(expected_key, "Token does not carry the expected intent");
                None
            }
            Some(value) => Some(value),
        }
    }

    /// Issue a token for `intent` with the default lifetime.
    pub fn issue_intent(&self, intent: TokenIntent, value: impl Into<Value>) -> AuthResult<String> {
        let mut payload = Payload::new();
        payload.insert(intent.key().to_string(), value.into());
        self.issue(payload, self.default_ttl)
    }

    /// Redeem a token for `intent`.
    pub fn redeem_intent(&self, token: &str, intent: TokenIntent) -> Option<Value> {
        self.redeem(token, intent.key())
    }

    /// `{"confirm": account_id}` token.
    pub fn issue_confirmation(&self, account_id: AccountId) -> AuthResult<String> {
        self.issue_intent(TokenIntent::Confirm, account_id)
    }

    /// `{"email": email}` token for the password reset link.
    pub fn issue_password_reset(&self, email: &str) -> AuthResult<String> {
        self.issue_intent(TokenIntent::ResetPassword, email)
    }

    /// `{"update-email": new_email}` token for the email change link.
    pub fn issue_email_update(&self, new_email: &str) -> AuthResult<String> {
        self.issue_intent(TokenIntent::UpdateEmail, new_email)
    }

    /// Account id carried by a live confirmation token.
    pub fn confirmation_account(&self, token: &str) -> Option<AccountId> {
        self.redeem_intent(token, TokenIntent::Confirm)?.as_i64()
    }

    /// Email carried by a live password reset token.
    pub fn password_reset_email(&self, token: &str) -> Option<String> {
        self.redeem_string(token, TokenIntent::ResetPassword)
    }

    /// New email carried by a live email update token.
    pub fn email_update_target(&self, token: &str) -> Option<String> {
        self.redeem_string(token, TokenIntent::UpdateEmail)
    }

    fn redeem_string(&self, token: &str, intent: TokenIntent) -> Option<String> {
        match self.redeem_intent(token, intent)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}
