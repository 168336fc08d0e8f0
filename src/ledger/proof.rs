//! Audit proofs
//!
//! A proof is the ordered set of blocks for one consentId. Consent blocks are
//! usually interleaved with unrelated blocks, so each returned block is
//! checked against the full chain instead of against its neighbours in the
//! proof.

use serde::{Deserialize, Serialize};

use crate::ledger::block::Block;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub blocks: Vec<Block>,
    /// Length of the full chain the proof was taken from.
    pub chain_length: u64,
    pub tip_hash: String,
}

impl ProofResult {
    fn failed(error: String, blocks: Vec<Block>, chain: &[Block]) -> Self {
        Self {
            ok: false,
            error: Some(error),
            blocks,
            chain_length: chain.len() as u64,
            tip_hash: tip_hash(chain),
        }
    }
}

fn tip_hash(chain: &[Block]) -> String {
    chain.last().map(|b| b.hash.clone()).unwrap_or_default()
}

/// Build a proof for `history` (already filtered and index-ordered) taken
/// from `chain`.
pub fn extract_proof(chain: &[Block], history: Vec<Block>) -> ProofResult {
    if history.is_empty() {
        return ProofResult::failed("consentId not found".to_string(), history, chain);
    }

    for block in &history {
        let position = block.index as usize;

        let anchored = chain
            .get(position)
            .map_or(false, |stored| stored.hash == block.hash);
        if !anchored {
            let error = format!("block {} is not at its index in the chain", block.index);
            return ProofResult::failed(error, history, chain);
        }

        if !block.verify_hash() {
            let error = format!("block {} hash mismatch", block.index);
            return ProofResult::failed(error, history, chain);
        }

        if let Some(successor) = chain.get(position + 1) {
            if successor.prev_hash != block.hash {
                let error = format!("block {} is not linked by its successor", block.index);
                return ProofResult::failed(error, history, chain);
            }
        }
    }

    ProofResult {
        ok: true,
        error: None,
        blocks: history,
        chain_length: chain.len() as u64,
        tip_hash: tip_hash(chain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::{BlockBody, RevokePayload};

    fn chain_of(len: usize) -> Vec<Block> {
        let mut blocks = vec![Block::genesis()];
        for i in 1..len {
            let prev_hash = blocks[i - 1].hash.clone();
            blocks.push(Block::new(
                i as u64,
                BlockBody::Revoke(RevokePayload {
                    consent_id: format!("c{}", i % 2),
                }),
                "02ab".to_string(),
                "sig".to_string(),
                prev_hash,
            ));
        }
        blocks
    }

    #[test]
    fn test_missing_consent() {
        let chain = chain_of(3);
        let proof = extract_proof(&chain, Vec::new());
        assert!(!proof.ok);
        assert_eq!(proof.error.as_deref(), Some("consentId not found"));
        assert_eq!(proof.chain_length, 3);
    }

    #[test]
    fn test_interleaved_blocks_are_accepted() {
        let chain = chain_of(5);
        // c1 lives at positions 1 and 3, with c0 in between
        let history = vec![chain[1].clone(), chain[3].clone()];
        let proof = extract_proof(&chain, history);

        assert!(proof.ok, "{:?}", proof.error);
        assert_eq!(proof.blocks.len(), 2);
        assert_eq!(proof.tip_hash, chain[4].hash);
    }

    #[test]
    fn test_foreign_block_is_rejected() {
        let chain = chain_of(4);
        let mut forged = chain[2].clone();
        forged.timestamp = "2000-01-01T00:00:00.000Z".to_string();
        forged.hash = forged.calculate_hash();

        let proof = extract_proof(&chain, vec![forged]);
        assert!(!proof.ok);
        assert!(proof.error.unwrap().contains("not at its index"));
    }

    #[test]
    fn test_broken_successor_link() {
        let mut chain = chain_of(4);
        chain[3].prev_hash = "0".repeat(64);

        let proof = extract_proof(&chain, vec![chain[2].clone()]);
        assert!(!proof.ok);
        assert!(proof.error.unwrap().contains("successor"));
    }
}
