//! Shared utility functions

use sha2::{Digest, Sha256};

/// Avatar lookup hash for an email address.
///
/// Lower-case hex SHA-256 of the trimmed, lower-cased address, as accepted by
/// Gravatar.
///
/// # Examples
///
/// ```
/// use inkwell_server::util::avatar_hash;
///
/// assert_eq!(avatar_hash("Me@Example.com "), avatar_hash("me@example.com"));
/// assert_eq!(avatar_hash("me@example.com").len(), 64);
/// ```
pub fn avatar_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Build a Gravatar image URL from an avatar hash.
pub fn gravatar_url(hash: &str, size: u32, default: &str, rating: &str) -> String {
    format!("https://secure.gravatar.com/avatar/{hash}?s={size}&d={default}&r={rating}")
}
