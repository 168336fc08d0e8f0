//! In-memory block sequence
//!
//! `Chain` is the pure state of the ledger: the ordered blocks plus indexes
//! from consentId to block positions. Appends are prepared against an
//! immutable chain and only become visible once pushed onto a copy.

use std::collections::HashMap;

use crate::crypto::{message_hash, CryptoProvider};
use crate::error::LedgerError;
use crate::ledger::block::{Block, BlockBody, GivePayload, RevokePayload};
use crate::ledger::message::{
    derive_consent_id, give_message, present, revoke_message, GiveRequest, RevokeRequest,
    INSECURE_PLACEHOLDER,
};
use crate::ledger::proof::{extract_proof, ProofResult};
use crate::ledger::service::LedgerOptions;
use crate::ledger::status::{ConsentState, StatusResult};
use crate::ledger::verify::{verify_chain, ChainViolation};

#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    /// consentId -> position of its first GIVE
    grants: HashMap<String, usize>,
    /// consentId -> positions of all its GIVE/REVOKE blocks
    events: HashMap<String, Vec<usize>>,
}

impl Chain {
    /// Chain holding only a fresh genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
            grants: HashMap::new(),
            events: HashMap::new(),
        }
    }

    /// Index a loaded block sequence. Contents are not verified here.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, LedgerError> {
        if blocks.is_empty() {
            return Err(LedgerError::Storage(
                "ledger contains no genesis block".to_string(),
            ));
        }

        let mut chain = Self {
            blocks: Vec::with_capacity(blocks.len()),
            grants: HashMap::new(),
            events: HashMap::new(),
        };
        for block in blocks {
            chain.push(block);
        }
        Ok(chain)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// The first GIVE block recorded for `consent_id`.
    pub fn grant(&self, consent_id: &str) -> Option<&Block> {
        self.grants.get(consent_id).map(|&pos| &self.blocks[pos])
    }

    /// GIVE/REVOKE blocks for `consent_id`, ordered by block index.
    pub fn history(&self, consent_id: &str) -> Vec<Block> {
        let mut history: Vec<Block> = self
            .events
            .get(consent_id)
            .map(|positions| positions.iter().map(|&pos| self.blocks[pos].clone()).collect())
            .unwrap_or_default();
        history.sort_by_key(|block| block.index);
        history
    }

    pub(crate) fn push(&mut self, block: Block) {
        let position = self.blocks.len();
        if let Some(consent_id) = block.consent_id() {
            if matches!(block.body, BlockBody::Give(_)) {
                self.grants.entry(consent_id.to_string()).or_insert(position);
            }
            self.events
                .entry(consent_id.to_string())
                .or_default()
                .push(position);
        }
        self.blocks.push(block);
    }

    /// Validate a grant request and build the block that would record it.
    pub fn prepare_give(
        &self,
        request: &GiveRequest,
        crypto: &CryptoProvider,
        options: &LedgerOptions,
    ) -> Result<(String, Block), LedgerError> {
        let scopes = present(&request.scopes);
        let data_hash = present(&request.data_hash);
        let expiry = request.expiry.filter(|&expiry| expiry != 0);

        let (Some(scopes), Some(expiry), Some(data_hash)) = (scopes, expiry, data_hash) else {
            return Err(LedgerError::missing_fields(
                "scopes, expiry and dataHash are required",
            ));
        };

        if expiry < 0 {
            return Err(LedgerError::Validation(format!(
                "expiry must be a positive unix timestamp, got {}",
                expiry
            )));
        }

        let subject_pub_key = match present(&request.subject_pub_key) {
            Some(key) => key,
            None if options.insecure => INSECURE_PLACEHOLDER,
            None => return Err(LedgerError::missing_fields("subjectPubKey is required")),
        };
        let signature = signature_field(&request.signature, options)?;

        let hash = message_hash(&give_message(scopes, expiry, data_hash));
        if !options.insecure && !crypto.verify(subject_pub_key, &hash, signature)? {
            return Err(LedgerError::InvalidSignature("GIVE".to_string()));
        }

        let consent_id = derive_consent_id(&hash, subject_pub_key);
        if self.grants.contains_key(&consent_id) {
            return Err(LedgerError::Conflict(format!(
                "consent {} is already recorded",
                consent_id
            )));
        }

        let tip = self.tip();
        let block = Block::new(
            next_index(tip)?,
            BlockBody::Give(GivePayload {
                consent_id: consent_id.clone(),
                scopes: scopes.to_string(),
                expiry,
                data_hash: data_hash.to_string(),
            }),
            subject_pub_key.to_string(),
            signature.to_string(),
            tip.hash.clone(),
        );

        Ok((consent_id, block))
    }

    /// Validate a revoke request as of `now` and build its block.
    pub fn prepare_revoke(
        &self,
        request: &RevokeRequest,
        crypto: &CryptoProvider,
        options: &LedgerOptions,
        now: i64,
    ) -> Result<(String, Block), LedgerError> {
        let Some(consent_id) = present(&request.consent_id) else {
            return Err(LedgerError::missing_fields("consentId is required"));
        };

        let grant = self
            .grant(consent_id)
            .ok_or_else(|| LedgerError::NotFound(consent_id.to_string()))?;

        let subject_pub_key = match present(&request.subject_pub_key) {
            Some(key) => key,
            None if options.insecure => grant.subject_pub_key.as_str(),
            None => return Err(LedgerError::missing_fields("subjectPubKey is required")),
        };
        let signature = signature_field(&request.signature, options)?;

        if subject_pub_key != grant.subject_pub_key {
            return Err(LedgerError::SignerMismatch {
                consent_id: consent_id.to_string(),
            });
        }

        let hash = message_hash(&revoke_message(consent_id));
        if !options.insecure && !crypto.verify(subject_pub_key, &hash, signature)? {
            return Err(LedgerError::InvalidSignature("REVOKE".to_string()));
        }

        match self.status_at(consent_id, now).state {
            ConsentState::Active => {}
            ConsentState::Revoked => {
                return Err(LedgerError::Conflict(format!(
                    "consent {} is already revoked",
                    consent_id
                )));
            }
            ConsentState::Expired => {
                return Err(LedgerError::Conflict(format!(
                    "consent {} is expired",
                    consent_id
                )));
            }
            ConsentState::Unknown => return Err(LedgerError::NotFound(consent_id.to_string())),
        }

        let tip = self.tip();
        let block = Block::new(
            next_index(tip)?,
            BlockBody::Revoke(RevokePayload {
                consent_id: consent_id.to_string(),
            }),
            subject_pub_key.to_string(),
            signature.to_string(),
            tip.hash.clone(),
        );

        Ok((consent_id.to_string(), block))
    }

    /// Status of `consent_id` as of `now` (unix seconds).
    pub fn status_at(&self, consent_id: &str, now: i64) -> StatusResult {
        StatusResult::derive(self.history(consent_id), now)
    }

    pub fn proof(&self, consent_id: &str) -> ProofResult {
        extract_proof(&self.blocks, self.history(consent_id))
    }

    pub fn verify_integrity(&self, crypto: &CryptoProvider) -> Result<(), ChainViolation> {
        verify_chain(&self.blocks, crypto)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

fn next_index(tip: &Block) -> Result<u64, LedgerError> {
    tip.index.checked_add(1).ok_or_else(|| LedgerError::Integrity {
        index: tip.index,
        reason: "block index overflow".to_string(),
    })
}

fn signature_field<'a>(
    signature: &'a Option<String>,
    options: &LedgerOptions,
) -> Result<&'a str, LedgerError> {
    match present(signature) {
        Some(signature) => Ok(signature),
        None if options.insecure => Ok(INSECURE_PLACEHOLDER),
        None => Err(LedgerError::missing_fields("signature is required")),
    }
}
