//! Ledger Block
//!
//! Defines the hash-sealed block structure. On the wire a block keeps `type`
//! and `payload` as sibling fields; in memory the pair is a single
//! [`BlockBody`] so a payload can never disagree with its type. A stored
//! payload that does not decode as its type is kept verbatim so the block
//! still hashes over exactly what is on disk.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::warn;

use crate::crypto::{canonicalize, sha256_hex};

/// All-zero sentinel used as the genesis `prevHash` and `hash`.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockType {
    Genesis,
    Give,
    Revoke,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Genesis => "GENESIS",
            BlockType::Give => "GIVE",
            BlockType::Revoke => "REVOKE",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GivePayload {
    pub consent_id: String,
    pub scopes: String,
    /// Unix seconds.
    pub expiry: i64,
    pub data_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RevokePayload {
    pub consent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockBody {
    Genesis,
    Give(GivePayload),
    Revoke(RevokePayload),
    /// Loaded payload that does not match the shape of its `type`.
    Malformed { kind: BlockType, payload: Value },
}

impl BlockBody {
    pub fn kind(&self) -> BlockType {
        match self {
            BlockBody::Genesis => BlockType::Genesis,
            BlockBody::Give(_) => BlockType::Give,
            BlockBody::Revoke(_) => BlockType::Revoke,
            BlockBody::Malformed { kind, .. } => *kind,
        }
    }

    pub fn consent_id(&self) -> Option<&str> {
        match self {
            BlockBody::Genesis | BlockBody::Malformed { .. } => None,
            BlockBody::Give(payload) => Some(&payload.consent_id),
            BlockBody::Revoke(payload) => Some(&payload.consent_id),
        }
    }

    /// JSON form of the payload as it is stored and hashed.
    pub fn payload_value(&self) -> Value {
        match self {
            BlockBody::Genesis => json!({}),
            BlockBody::Give(p) => json!({
                "consentId": p.consent_id,
                "scopes": p.scopes,
                "expiry": p.expiry,
                "dataHash": p.data_hash,
            }),
            BlockBody::Revoke(p) => json!({ "consentId": p.consent_id }),
            BlockBody::Malformed { payload, .. } => payload.clone(),
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireBlock", into = "WireBlock")]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub body: BlockBody,
    pub subject_pub_key: String,
    pub signature: String,
    pub prev_hash: String,
    pub hash: String,
}

impl Block {
    /// Build a sealed block on top of `prev_hash`.
    pub fn new(
        index: u64,
        body: BlockBody,
        subject_pub_key: String,
        signature: String,
        prev_hash: String,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: now_timestamp(),
            body,
            subject_pub_key,
            signature,
            prev_hash,
            hash: String::new(),
        };

        block.hash = block.calculate_hash();
        block
    }

    /// Genesis block: index 0, empty payload and signer, zero hashes.
    pub fn genesis() -> Self {
        Self {
            index: 0,
            timestamp: now_timestamp(),
            body: BlockBody::Genesis,
            subject_pub_key: String::new(),
            signature: String::new(),
            prev_hash: ZERO_HASH.to_string(),
            hash: ZERO_HASH.to_string(),
        }
    }

    pub fn kind(&self) -> BlockType {
        self.body.kind()
    }

    pub fn consent_id(&self) -> Option<&str> {
        self.body.consent_id()
    }

    /// Every field except `hash`, as the JSON object that gets hashed.
    pub fn hashable_value(&self) -> Value {
        json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "type": self.kind().as_str(),
            "payload": self.body.payload_value(),
            "subjectPubKey": self.subject_pub_key,
            "signature": self.signature,
            "prevHash": self.prev_hash,
        })
    }

    pub fn calculate_hash(&self) -> String {
        sha256_hex(canonicalize(&self.hashable_value()))
    }

    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub fn summary(&self) -> String {
        format!(
            "#{} {} {}",
            self.index,
            self.kind(),
            self.consent_id().unwrap_or("-")
        )
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlock {
    index: u64,
    timestamp: String,
    #[serde(rename = "type")]
    kind: BlockType,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    subject_pub_key: String,
    #[serde(default)]
    signature: String,
    prev_hash: String,
    hash: String,
}

impl From<WireBlock> for Block {
    fn from(wire: WireBlock) -> Self {
        let body = decode_body(wire.kind, &wire.payload).unwrap_or_else(|| {
            warn!(
                "Block {} carries a payload that is not a valid {} payload",
                wire.index, wire.kind
            );
            BlockBody::Malformed {
                kind: wire.kind,
                payload: wire.payload,
            }
        });

        Self {
            index: wire.index,
            timestamp: wire.timestamp,
            body,
            subject_pub_key: wire.subject_pub_key,
            signature: wire.signature,
            prev_hash: wire.prev_hash,
            hash: wire.hash,
        }
    }
}

fn decode_body(kind: BlockType, payload: &Value) -> Option<BlockBody> {
    match kind {
        BlockType::Genesis => match payload {
            Value::Null => Some(BlockBody::Genesis),
            Value::Object(map) if map.is_empty() => Some(BlockBody::Genesis),
            _ => None,
        },
        BlockType::Give => GivePayload::deserialize(payload).ok().map(BlockBody::Give),
        BlockType::Revoke => RevokePayload::deserialize(payload)
            .ok()
            .map(BlockBody::Revoke),
    }
}

impl From<Block> for WireBlock {
    fn from(block: Block) -> Self {
        Self {
            index: block.index,
            timestamp: block.timestamp,
            kind: block.body.kind(),
            payload: block.body.payload_value(),
            subject_pub_key: block.subject_pub_key,
            signature: block.signature,
            prev_hash: block.prev_hash,
            hash: block.hash,
        }
    }
}
