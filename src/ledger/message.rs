//! Signed consent messages
//!
//! The subject signs the hash of a canonical message object rather than the
//! request body itself, so the ledger can rebuild the exact signed bytes from a
//! stored block at any later time.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::crypto::{message_hash, sha256_hex, CryptoProvider};
use crate::error::LedgerError;

/// Placeholder stored for a missing signer or signature in insecure mode.
pub const INSECURE_PLACEHOLDER: &str = "insecure";

pub fn give_message(scopes: &str, expiry: i64, data_hash: &str) -> Value {
    json!({
        "action": "GIVE",
        "scopes": scopes,
        "expiry": expiry,
        "dataHash": data_hash,
    })
}

pub fn revoke_message(consent_id: &str) -> Value {
    json!({
        "action": "REVOKE",
        "consentId": consent_id,
    })
}

/// `consentId = sha256(giveMessageHash ‖ subjectPubKey)` over the hex strings.
pub fn derive_consent_id(give_message_hash: &str, subject_pub_key: &str) -> String {
    sha256_hex(format!("{}{}", give_message_hash, subject_pub_key))
}

/// Inbound grant request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiveRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_pub_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl GiveRequest {
    /// Build a request signed with `private_key`.
    pub fn signed(
        crypto: &CryptoProvider,
        private_key: &str,
        scopes: &str,
        expiry: i64,
        data_hash: &str,
    ) -> Result<Self, LedgerError> {
        let subject_pub_key = crypto.derive_public_key(private_key)?;
        let hash = message_hash(&give_message(scopes, expiry, data_hash));
        let signature = crypto.sign(private_key, &hash)?;

        Ok(Self {
            scopes: Some(scopes.to_string()),
            expiry: Some(expiry),
            data_hash: Some(data_hash.to_string()),
            subject_pub_key: Some(subject_pub_key),
            signature: Some(signature),
        })
    }
}

/// Inbound revoke request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_pub_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl RevokeRequest {
    pub fn signed(
        crypto: &CryptoProvider,
        private_key: &str,
        consent_id: &str,
    ) -> Result<Self, LedgerError> {
        let subject_pub_key = crypto.derive_public_key(private_key)?;
        let hash = message_hash(&revoke_message(consent_id));
        let signature = crypto.sign(private_key, &hash)?;

        Ok(Self {
            consent_id: Some(consent_id.to_string()),
            subject_pub_key: Some(subject_pub_key),
            signature: Some(signature),
        })
    }
}

/// Non-empty trimmed value of an optional request field.
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}
