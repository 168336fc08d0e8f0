#![allow(dead_code)]

use std::sync::Arc;

use consent_ledger::crypto::{CryptoProvider, SubjectKeypair};
use consent_ledger::ledger::{
    AppendReceipt, ConsentLedger, GiveRequest, LedgerOptions, RevokeRequest,
};
use consent_ledger::storage::InMemoryStorage;

/// Far enough in the future that no test run reaches it.
pub const FAR_EXPIRY: i64 = 4_102_444_800;

/// Open a ledger over fresh in-memory storage.
pub async fn setup_ledger(options: LedgerOptions) -> (Arc<InMemoryStorage>, ConsentLedger) {
    let storage = Arc::new(InMemoryStorage::new());
    let ledger = ConsentLedger::open(storage.clone(), options)
        .await
        .expect("Failed to open test ledger");
    (storage, ledger)
}

pub fn create_test_keypair() -> SubjectKeypair {
    CryptoProvider::new()
        .generate_keypair()
        .expect("Failed to generate keypair")
}

pub fn signed_give(keypair: &SubjectKeypair, scopes: &str, expiry: i64, data_hash: &str) -> GiveRequest {
    GiveRequest::signed(
        &CryptoProvider::new(),
        &keypair.private_key,
        scopes,
        expiry,
        data_hash,
    )
    .expect("Failed to sign GIVE")
}

pub fn signed_revoke(keypair: &SubjectKeypair, consent_id: &str) -> RevokeRequest {
    RevokeRequest::signed(&CryptoProvider::new(), &keypair.private_key, consent_id)
        .expect("Failed to sign REVOKE")
}

/// Record a long-lived grant for `keypair`.
pub async fn give_consent(
    ledger: &ConsentLedger,
    keypair: &SubjectKeypair,
    data_hash: &str,
) -> AppendReceipt {
    ledger
        .give(signed_give(keypair, "sms,email", FAR_EXPIRY, data_hash))
        .await
        .expect("GIVE should be accepted")
}
