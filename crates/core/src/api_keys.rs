//! API key generation, hashing, and webhook payload signing.
//!
//! Key material never leaves this module unhashed except inside
//! [`GeneratedApiKey::plaintext`], which callers show exactly once and then
//! drop. Storage and validation keep only the SHA-256 digest plus a short
//! visible prefix for identification.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of the generated API key string (alphanumeric characters).
pub const KEY_LENGTH: usize = 48;

/// Number of leading characters stored as a human-visible prefix.
pub const KEY_PREFIX_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// Scope name constants
// ---------------------------------------------------------------------------

/// Known scope names accepted on key creation.
pub mod scopes {
    /// Grants every operation, including admin reads and worker control.
    pub const ADMIN: &str = "admin";
    /// Submit jobs (`/queue`, `/generate`).
    pub const JOBS_SUBMIT: &str = "jobs:submit";
    /// Read job status and provider listings.
    pub const JOBS_READ: &str = "jobs:read";

    /// Scopes granted when a creation request names none.
    pub const DEFAULTS: [&str; 2] = [JOBS_SUBMIT, JOBS_READ];

    pub fn is_known(scope: &str) -> bool {
        matches!(scope, ADMIN | JOBS_SUBMIT | JOBS_READ)
    }
}

// ---------------------------------------------------------------------------
// API key generation
// ---------------------------------------------------------------------------

/// The result of generating a new API key.
pub struct GeneratedApiKey {
    /// The plaintext key (shown to the caller exactly once, never stored).
    pub plaintext: String,
    /// The first [`KEY_PREFIX_LENGTH`] characters of the key for display.
    pub prefix: String,
    /// The SHA-256 hex digest of the plaintext key (the stored form).
    pub hash: String,
}

/// Generate a new random API key.
///
/// Returns the plaintext (shown once), prefix (for identification), and
/// SHA-256 hash (for storage). The plaintext must never be persisted.
pub fn generate_api_key() -> GeneratedApiKey {
    let key: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect();

    let prefix = key[..KEY_PREFIX_LENGTH].to_string();
    let hash = hash_api_key(&key);

    GeneratedApiKey {
        plaintext: key,
        prefix,
        hash,
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Compute the SHA-256 hex digest of an API key.
///
/// Used both during key creation (to store the hash) and during
/// authentication (to look up the key by hash).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{digest:x}")
}

/// Extract the visible prefix from a plaintext API key.
pub fn extract_prefix(key: &str) -> &str {
    &key[..KEY_PREFIX_LENGTH.min(key.len())]
}

// ---------------------------------------------------------------------------
// Webhook payload signing
// ---------------------------------------------------------------------------

type HmacSha256 = Hmac<Sha256>;

/// Compute an HMAC-SHA256 signature for a webhook payload.
///
/// The `secret` is the deployment's webhook signing secret; the `payload` is
/// the JSON body being delivered. Returns the hex-encoded signature carried
/// in the delivery's signature header.
pub fn compute_webhook_signature(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    let bytes = mac.finalize().into_bytes();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Key generation ----------------------------------------------------

    #[test]
    fn generated_key_has_correct_length() {
        let key = generate_api_key();
        assert_eq!(key.plaintext.len(), KEY_LENGTH);
    }

    #[test]
    fn generated_key_prefix_matches_start() {
        let key = generate_api_key();
        assert_eq!(&key.plaintext[..KEY_PREFIX_LENGTH], key.prefix);
    }

    #[test]
    fn generated_key_is_alphanumeric() {
        let key = generate_api_key();
        assert!(key.plaintext.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn hash_matches_regeneration() {
        let key = generate_api_key();
        assert_eq!(key.hash, hash_api_key(&key.plaintext));
    }

    #[test]
    fn different_keys_produce_different_hashes() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    // -- Hashing -----------------------------------------------------------

    #[test]
    fn hash_is_sha256_hex() {
        let hash = hash_api_key("test_key_123");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn extract_prefix_handles_short_key() {
        assert_eq!(extract_prefix("abc"), "abc");
        assert_eq!(extract_prefix("abcdefghijkl"), "abcdefgh");
    }

    // -- Scopes --------------------------------------------------------------

    #[test]
    fn known_scopes_are_recognized() {
        assert!(scopes::is_known(scopes::ADMIN));
        assert!(scopes::is_known(scopes::JOBS_SUBMIT));
        assert!(scopes::is_known(scopes::JOBS_READ));
        assert!(!scopes::is_known("jobs:delete"));
    }

    // -- Webhook signing -----------------------------------------------------

    #[test]
    fn signature_is_deterministic_hex() {
        let a = compute_webhook_signature("secret", r#"{"state":"Completed"}"#);
        let b = compute_webhook_signature("secret", r#"{"state":"Completed"}"#);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_differs_with_secret_and_payload() {
        let base = compute_webhook_signature("secret", "payload");
        assert_ne!(base, compute_webhook_signature("other", "payload"));
        assert_ne!(base, compute_webhook_signature("secret", "other"));
    }
}
