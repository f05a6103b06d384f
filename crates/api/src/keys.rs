//! In-process API key store.
//!
//! Keys are issued by `POST /apikeys`, held in memory for the life of the
//! process, and looked up by SHA-256 hash on every authenticated request.
//! Plaintext key material exists only in the creation response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use aiq_core::api_keys::{generate_api_key, hash_api_key, scopes};
use aiq_core::{DispatchError, DispatchResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A stored API key. Holds the hash and metadata, never the plaintext.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    /// First characters of the plaintext, for identification in listings.
    pub prefix: String,
    /// SHA-256 hex digest of the plaintext; also the lookup key.
    pub hash: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Keys past this instant no longer authenticate.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Key creation input.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKey {
    pub name: String,
    /// Granted scopes; defaults to `jobs:submit` + `jobs:read` when omitted.
    pub scopes: Option<Vec<String>>,
    pub expires_in_days: Option<i64>,
}

/// Key creation response. The `key` field is the plaintext, shown exactly
/// once; only the hash is retained.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedApiKey {
    pub id: Uuid,
    pub key: String,
    pub visible_key: String,
    pub name: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// ApiKeyStore
// ---------------------------------------------------------------------------

/// Concurrent map from key hash to record.
#[derive(Default)]
pub struct ApiKeyStore {
    keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the input, mint a key, and store its record.
    pub async fn create(&self, input: CreateApiKey) -> DispatchResult<IssuedApiKey> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DispatchError::Validation(
                "key name must not be empty".into(),
            ));
        }

        let granted = match input.scopes {
            None => scopes::DEFAULTS.iter().map(|s| s.to_string()).collect(),
            Some(list) => {
                if list.is_empty() {
                    return Err(DispatchError::Validation(
                        "scopes must not be empty when provided".into(),
                    ));
                }
                for scope in &list {
                    if !scopes::is_known(scope) {
                        return Err(DispatchError::Validation(format!(
                            "unknown scope: {scope}"
                        )));
                    }
                }
                list
            }
        };

        let expires_at = match input.expires_in_days {
            None => None,
            Some(days) if days > 0 => Some(Utc::now() + chrono::Duration::days(days)),
            Some(days) => {
                return Err(DispatchError::Validation(format!(
                    "expiresInDays must be positive, got {days}"
                )));
            }
        };

        let generated = generate_api_key();
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            prefix: generated.prefix.clone(),
            hash: generated.hash.clone(),
            scopes: granted,
            created_at: Utc::now(),
            expires_at,
        };

        let issued = IssuedApiKey {
            id: record.id,
            key: generated.plaintext,
            visible_key: record.prefix.clone(),
            name: record.name.clone(),
            scopes: record.scopes.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
        };

        self.keys.write().await.insert(generated.hash, record);
        Ok(issued)
    }

    /// Resolve a plaintext bearer key to its record. Unknown and expired
    /// keys both come back as `None`.
    pub async fn authenticate(&self, plaintext: &str) -> Option<ApiKeyRecord> {
        let hash = hash_api_key(plaintext);
        let keys = self.keys.read().await;
        let record = keys.get(&hash)?;
        if let Some(expiry) = record.expires_at {
            if expiry <= Utc::now() {
                return None;
            }
        }
        Some(record.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
