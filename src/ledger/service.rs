//! Consent Ledger Service
//!
//! Owns the loaded chain for its lifetime. Appends are serialized by a single
//! writer lock held across validate, persist and publish; readers work on an
//! `Arc` snapshot and never wait for a write that is still persisting.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::crypto::CryptoProvider;
use crate::error::LedgerError;
use crate::ledger::block::Block;
use crate::ledger::chain::Chain;
use crate::ledger::message::{GiveRequest, RevokeRequest};
use crate::ledger::proof::ProofResult;
use crate::ledger::status::StatusResult;
use crate::ledger::verify::{ChainViolation, VerifyResult};
use crate::storage::StorageAdapter;

/// Behaviour switches for the ledger core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerOptions {
    /// Skip signature verification on append. Demo use only.
    pub insecure: bool,
    /// Refuse appends while the loaded chain fails verification.
    pub hardened: bool,
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendReceipt {
    pub consent_id: String,
    pub block: Block,
}

pub struct ConsentLedger {
    storage: Arc<dyn StorageAdapter>,
    crypto: CryptoProvider,
    options: LedgerOptions,
    chain: RwLock<Arc<Chain>>,
    writer: Mutex<()>,
    blocked: Option<ChainViolation>,
}

impl ConsentLedger {
    /// Load the chain from `storage` and check its integrity.
    pub async fn open(
        storage: Arc<dyn StorageAdapter>,
        options: LedgerOptions,
    ) -> Result<Self, LedgerError> {
        if options.insecure && options.hardened {
            return Err(LedgerError::Config(
                "insecure mode cannot be combined with hardened mode".to_string(),
            ));
        }

        let chain = Chain::from_blocks(storage.load().await?)?;
        let crypto = CryptoProvider::new();
        info!("Loaded {} block(s) from storage", chain.len());

        let blocked = match chain.verify_integrity(&crypto) {
            Ok(()) => {
                info!("Chain integrity verified");
                None
            }
            Err(violation) => {
                warn!(
                    "Chain integrity violation at block {}: {}",
                    violation.index, violation.kind
                );
                if options.hardened {
                    warn!("Hardened mode: appends are blocked until the chain is repaired");
                    Some(violation)
                } else {
                    None
                }
            }
        };

        if options.insecure {
            warn!("INSECURE MODE: signature verification is disabled for appends");
        }

        Ok(Self {
            storage,
            crypto,
            options,
            chain: RwLock::new(Arc::new(chain)),
            writer: Mutex::new(()),
            blocked,
        })
    }

    pub fn options(&self) -> LedgerOptions {
        self.options
    }

    pub fn crypto(&self) -> &CryptoProvider {
        &self.crypto
    }

    /// Immutable view of the chain as of the last completed append.
    pub async fn snapshot(&self) -> Arc<Chain> {
        self.chain.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Record a consent grant.
    pub async fn give(&self, request: GiveRequest) -> Result<AppendReceipt, LedgerError> {
        let _writer = self.writer.lock().await;
        self.ensure_writable()?;

        let current = self.snapshot().await;
        let (consent_id, block) = current.prepare_give(&request, &self.crypto, &self.options)?;
        self.commit(&current, consent_id, block).await
    }

    /// Record the revocation of an active consent.
    pub async fn revoke(&self, request: RevokeRequest) -> Result<AppendReceipt, LedgerError> {
        let _writer = self.writer.lock().await;
        self.ensure_writable()?;

        let current = self.snapshot().await;
        let (consent_id, block) = current.prepare_revoke(
            &request,
            &self.crypto,
            &self.options,
            Utc::now().timestamp(),
        )?;
        self.commit(&current, consent_id, block).await
    }

    pub async fn status_of(&self, consent_id: &str) -> StatusResult {
        self.snapshot()
            .await
            .status_at(consent_id, Utc::now().timestamp())
    }

    pub async fn proof(&self, consent_id: &str) -> ProofResult {
        self.snapshot().await.proof(consent_id)
    }

    pub async fn verify(&self) -> VerifyResult {
        let chain = self.snapshot().await;
        VerifyResult::from(chain.verify_integrity(&self.crypto))
    }

    fn ensure_writable(&self) -> Result<(), LedgerError> {
        match &self.blocked {
            Some(violation) => Err(violation.clone().into()),
            None => Ok(()),
        }
    }

    /// Persist `current + block` and publish it. Must be called with the
    /// writer lock held.
    async fn commit(
        &self,
        current: &Chain,
        consent_id: String,
        block: Block,
    ) -> Result<AppendReceipt, LedgerError> {
        let mut next = current.clone();
        next.push(block.clone());

        self.storage.save(next.blocks()).await?;
        debug!("Persisted {} block(s)", next.len());

        *self.chain.write().await = Arc::new(next);
        info!("Appended block {}", block.summary());

        Ok(AppendReceipt { consent_id, block })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[tokio::test]
    async fn test_open_bootstraps_genesis() {
        let storage = Arc::new(InMemoryStorage::new());
        let ledger = ConsentLedger::open(storage.clone(), LedgerOptions::default())
            .await
            .unwrap();

        assert_eq!(ledger.len().await, 1);
        assert!(ledger.verify().await.valid);
    }

    #[tokio::test]
    async fn test_open_rejects_insecure_hardened() {
        let storage = Arc::new(InMemoryStorage::new());
        let options = LedgerOptions {
            insecure: true,
            hardened: true,
        };

        let result = ConsentLedger::open(storage, options).await;
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[tokio::test]
    async fn test_give_persists_before_publish() {
        let storage = Arc::new(InMemoryStorage::new());
        let ledger = ConsentLedger::open(storage.clone(), LedgerOptions::default())
            .await
            .unwrap();
        let key = ledger.crypto().generate_private_key();

        let request =
            GiveRequest::signed(ledger.crypto(), &key, "sms", 4_000_000_000, "d").unwrap();
        let receipt = ledger.give(request).await.unwrap();

        let persisted = storage.stored_blocks().await.unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[1], receipt.block);
        assert_eq!(ledger.len().await, 2);
    }
}
