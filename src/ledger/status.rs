//! Consent status derivation
//!
//! A consent has no stored state. Its status is folded from the ordered
//! GIVE/REVOKE blocks that carry its consentId, evaluated against a clock.

use serde::{Deserialize, Serialize};

use crate::ledger::block::{Block, BlockBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    Unknown,
    Active,
    Revoked,
    /// Derived at query time, never written.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusReason {
    Expired,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub found: bool,
    pub active: bool,
    pub state: ConsentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StatusReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grantor_pub_key: Option<String>,
    pub history: Vec<Block>,
}

impl StatusResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            active: false,
            state: ConsentState::Unknown,
            reason: None,
            scope: None,
            expiry: None,
            last_block_hash: None,
            grantor_pub_key: None,
            history: Vec::new(),
        }
    }

    /// Fold an index-ordered history into a status as of `now` (unix seconds).
    pub fn derive(history: Vec<Block>, now: i64) -> Self {
        let Some(last) = history.last() else {
            return Self::not_found();
        };

        let grant = history.iter().find_map(|block| match &block.body {
            BlockBody::Give(payload) => Some((block, payload)),
            _ => None,
        });

        let state = match &last.body {
            BlockBody::Give(payload) if payload.expiry < now => ConsentState::Expired,
            BlockBody::Give(_) => ConsentState::Active,
            BlockBody::Revoke(_) => ConsentState::Revoked,
            BlockBody::Genesis | BlockBody::Malformed { .. } => ConsentState::Unknown,
        };

        let reason = match state {
            ConsentState::Expired => Some(StatusReason::Expired),
            ConsentState::Revoked => Some(StatusReason::Revoked),
            _ => None,
        };

        let last_block_hash = Some(last.hash.clone());
        let scope = grant.map(|(_, payload)| payload.scopes.clone());
        let expiry = grant.map(|(_, payload)| payload.expiry);
        let grantor_pub_key = grant.map(|(block, _)| block.subject_pub_key.clone());

        Self {
            found: true,
            active: state == ConsentState::Active,
            state,
            reason,
            scope,
            expiry,
            last_block_hash,
            grantor_pub_key,
            history,
        }
    }
}
