//! Chain Verification
//!
//! Single-pass integrity check over the full block sequence: genesis shape,
//! hash linkage, index continuity, self-hashes, signatures and signer
//! continuity between a grant and its revocation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::{message_hash, CryptoProvider};
use crate::error::LedgerError;
use crate::ledger::block::{Block, BlockBody, BlockType, ZERO_HASH};
use crate::ledger::message::{derive_consent_id, give_message, revoke_message};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    #[error("empty chain")]
    EmptyChain,

    #[error("malformed genesis block")]
    MalformedGenesis,

    #[error("unexpected genesis block")]
    UnexpectedGenesis,

    #[error("prevHash mismatch")]
    PrevHashMismatch,

    #[error("index not continuous")]
    IndexNotContinuous,

    #[error("hash mismatch")]
    HashMismatch,

    #[error("malformed payload {0}")]
    MalformedPayload(BlockType),

    #[error("invalid signature {0}")]
    InvalidSignature(BlockType),

    #[error("consentId does not match signed grant")]
    ConsentIdMismatch,

    #[error("grant not found for revoke")]
    GrantNotFound,

    #[error("revoke signer mismatch")]
    SignerMismatch,
}

/// First violation found, positioned by the block's place in the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainViolation {
    pub index: u64,
    pub kind: ViolationKind,
}

impl ChainViolation {
    fn at(position: usize, kind: ViolationKind) -> Self {
        Self {
            index: position as u64,
            kind,
        }
    }
}

impl From<ChainViolation> for LedgerError {
    fn from(violation: ChainViolation) -> Self {
        LedgerError::Integrity {
            index: violation.index,
            reason: violation.kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VerifyResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            index: None,
            reason: None,
        }
    }
}

impl From<Result<(), ChainViolation>> for VerifyResult {
    fn from(result: Result<(), ChainViolation>) -> Self {
        match result {
            Ok(()) => Self::valid(),
            Err(violation) => Self {
                valid: false,
                index: Some(violation.index),
                reason: Some(violation.kind.to_string()),
            },
        }
    }
}

/// Verify the complete block sequence, returning the first violation.
pub fn verify_chain(blocks: &[Block], crypto: &CryptoProvider) -> Result<(), ChainViolation> {
    let Some(genesis) = blocks.first() else {
        return Err(ChainViolation::at(0, ViolationKind::EmptyChain));
    };

    if genesis.index != 0
        || genesis.body != BlockBody::Genesis
        || genesis.prev_hash != ZERO_HASH
        || genesis.hash != ZERO_HASH
    {
        return Err(ChainViolation::at(0, ViolationKind::MalformedGenesis));
    }

    // consentId -> signer of its first grant
    let mut grants: HashMap<&str, &str> = HashMap::new();

    for i in 1..blocks.len() {
        let block = &blocks[i];
        let prev = &blocks[i - 1];

        if block.prev_hash != prev.hash {
            return Err(ChainViolation::at(i, ViolationKind::PrevHashMismatch));
        }

        if block.index != prev.index + 1 {
            return Err(ChainViolation::at(i, ViolationKind::IndexNotContinuous));
        }

        if !block.verify_hash() {
            return Err(ChainViolation::at(i, ViolationKind::HashMismatch));
        }

        match &block.body {
            BlockBody::Genesis => {
                return Err(ChainViolation::at(i, ViolationKind::UnexpectedGenesis));
            }
            BlockBody::Malformed { kind, .. } => {
                return Err(ChainViolation::at(i, ViolationKind::MalformedPayload(*kind)));
            }
            BlockBody::Give(payload) => {
                let hash = message_hash(&give_message(
                    &payload.scopes,
                    payload.expiry,
                    &payload.data_hash,
                ));
                if !signature_holds(crypto, block, &hash) {
                    return Err(ChainViolation::at(
                        i,
                        ViolationKind::InvalidSignature(BlockType::Give),
                    ));
                }
                if derive_consent_id(&hash, &block.subject_pub_key) != payload.consent_id {
                    return Err(ChainViolation::at(i, ViolationKind::ConsentIdMismatch));
                }
                grants
                    .entry(payload.consent_id.as_str())
                    .or_insert(block.subject_pub_key.as_str());
            }
            BlockBody::Revoke(payload) => {
                let hash = message_hash(&revoke_message(&payload.consent_id));
                if !signature_holds(crypto, block, &hash) {
                    return Err(ChainViolation::at(
                        i,
                        ViolationKind::InvalidSignature(BlockType::Revoke),
                    ));
                }
                match grants.get(payload.consent_id.as_str()) {
                    None => {
                        return Err(ChainViolation::at(i, ViolationKind::GrantNotFound));
                    }
                    Some(signer) if *signer != block.subject_pub_key => {
                        return Err(ChainViolation::at(i, ViolationKind::SignerMismatch));
                    }
                    Some(_) => {}
                }
            }
        }
    }

    debug!("Chain verification successful: {} blocks", blocks.len());
    Ok(())
}

fn signature_holds(crypto: &CryptoProvider, block: &Block, message_hash: &str) -> bool {
    match crypto.verify(&block.subject_pub_key, message_hash, &block.signature) {
        Ok(valid) => valid,
        Err(e) => {
            warn!("Block {} carries an undecodable signature: {}", block.index, e);
            false
        }
    }
}

/// Positions of non-genesis blocks whose stored hash does not recompute.
pub fn find_tampered_blocks(blocks: &[Block]) -> Vec<u64> {
    let tampered: Vec<u64> = blocks
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, block)| !block.verify_hash())
        .map(|(i, _)| i as u64)
        .collect();

    if !tampered.is_empty() {
        info!("Found {} block(s) with mismatched hashes", tampered.len());
    }
    tampered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::GivePayload;

    fn signed_give(crypto: &CryptoProvider, private_key: &str, prev: &Block) -> Block {
        let public_key = crypto.derive_public_key(private_key).unwrap();
        let hash = message_hash(&give_message("sms", 4_000_000_000, "d"));
        let signature = crypto.sign(private_key, &hash).unwrap();
        Block::new(
            prev.index + 1,
            BlockBody::Give(GivePayload {
                consent_id: derive_consent_id(&hash, &public_key),
                scopes: "sms".to_string(),
                expiry: 4_000_000_000,
                data_hash: "d".to_string(),
            }),
            public_key,
            signature,
            prev.hash.clone(),
        )
    }

    #[test]
    fn test_verify_genesis_only() {
        let crypto = CryptoProvider::new();
        assert!(verify_chain(&[Block::genesis()], &crypto).is_ok());
    }

    #[test]
    fn test_verify_empty_chain() {
        let crypto = CryptoProvider::new();
        let violation = verify_chain(&[], &crypto).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::EmptyChain);
    }

    #[test]
    fn test_verify_signed_chain() {
        let crypto = CryptoProvider::new();
        let key = crypto.generate_private_key();
        let genesis = Block::genesis();
        let give = signed_give(&crypto, &key, &genesis);

        assert!(verify_chain(&[genesis, give], &crypto).is_ok());
    }

    #[test]
    fn test_verify_detects_bad_genesis() {
        let crypto = CryptoProvider::new();
        let mut genesis = Block::genesis();
        genesis.prev_hash = "1".repeat(64);

        let violation = verify_chain(&[genesis], &crypto).unwrap_err();
        assert_eq!(violation.index, 0);
        assert_eq!(violation.kind, ViolationKind::MalformedGenesis);
    }

    #[test]
    fn test_verify_detects_forged_signature() {
        let crypto = CryptoProvider::new();
        let key = crypto.generate_private_key();
        let genesis = Block::genesis();
        let mut give = signed_give(&crypto, &key, &genesis);

        // Re-seal with a signature over a different message
        give.signature = crypto.sign(&key, &message_hash(&give_message("all", 1, "x"))).unwrap();
        give.hash = give.calculate_hash();

        let violation = verify_chain(&[genesis, give], &crypto).unwrap_err();
        assert_eq!(violation.index, 1);
        assert_eq!(violation.kind, ViolationKind::InvalidSignature(BlockType::Give));
        assert_eq!(violation.kind.to_string(), "invalid signature GIVE");
    }

    #[test]
    fn test_verify_resealed_malformed_payload() {
        let crypto = CryptoProvider::new();
        let key = crypto.generate_private_key();
        let genesis = Block::genesis();
        let mut give = signed_give(&crypto, &key, &genesis);

        let mut payload = give.body.payload_value();
        payload["purpose"] = serde_json::json!("marketing");
        give.body = BlockBody::Malformed {
            kind: BlockType::Give,
            payload,
        };
        give.hash = give.calculate_hash();

        let violation = verify_chain(&[genesis, give], &crypto).unwrap_err();
        assert_eq!(violation.index, 1);
        assert_eq!(violation.kind, ViolationKind::MalformedPayload(BlockType::Give));
    }

    #[test]
    fn test_find_tampered_blocks() {
        let crypto = CryptoProvider::new();
        let key = crypto.generate_private_key();
        let genesis = Block::genesis();
        let mut give = signed_give(&crypto, &key, &genesis);
        give.hash = "f".repeat(64);

        assert_eq!(find_tampered_blocks(&[genesis, give]), vec![1]);
    }

    #[test]
    fn test_verify_result_conversion() {
        let result = VerifyResult::from(Err(ChainViolation {
            index: 2,
            kind: ViolationKind::HashMismatch,
        }));
        assert!(!result.valid);
        assert_eq!(result.index, Some(2));
        assert_eq!(result.reason.as_deref(), Some("hash mismatch"));

        let value = serde_json::to_value(VerifyResult::valid()).unwrap();
        assert_eq!(value, serde_json::json!({ "valid": true }));
    }
}
