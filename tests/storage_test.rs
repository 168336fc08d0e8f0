//! File-backed ledger persistence

mod common;

use std::sync::Arc;

use common::*;
use consent_ledger::ledger::{ConsentLedger, LedgerOptions};
use consent_ledger::storage::{JsonFileStorage, StorageAdapter};
use consent_ledger::LedgerError;
use serde_json::Value;
use tempfile::tempdir;

async fn open_file_ledger(path: &std::path::Path, options: LedgerOptions) -> ConsentLedger {
    let storage = Arc::new(JsonFileStorage::new(path));
    ConsentLedger::open(storage, options)
        .await
        .expect("Failed to open file ledger")
}

#[tokio::test]
async fn test_chain_survives_reopen() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("data").join("ledger.json");
    let keypair = create_test_keypair();

    let consent_id = {
        let ledger = open_file_ledger(&path, LedgerOptions::default()).await;
        let grant = give_consent(&ledger, &keypair, "d").await;
        ledger
            .revoke(signed_revoke(&keypair, &grant.consent_id))
            .await
            .unwrap();
        grant.consent_id
    };

    let reopened = open_file_ledger(&path, LedgerOptions::default()).await;
    assert_eq!(reopened.len().await, 3);
    assert!(reopened.verify().await.valid);

    let status = reopened.status_of(&consent_id).await;
    assert!(status.found);
    assert!(!status.active);
}

#[tokio::test]
async fn test_document_layout() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("ledger.json");
    let keypair = create_test_keypair();

    let ledger = open_file_ledger(&path, LedgerOptions::default()).await;
    let grant = give_consent(&ledger, &keypair, "d").await;

    let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let blocks = raw["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1]["type"], "GIVE");
    assert_eq!(blocks[1]["payload"]["consentId"], grant.consent_id.as_str());
    assert_eq!(blocks[1]["payload"]["scopes"], "sms,email");
    assert_eq!(blocks[1]["payload"]["expiry"], FAR_EXPIRY);
    assert_eq!(blocks[1]["subjectPubKey"], keypair.public_key.as_str());
    assert_eq!(blocks[1]["prevHash"], blocks[0]["hash"]);
}

#[tokio::test]
async fn test_edited_file_is_detected() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("ledger.json");
    let keypair = create_test_keypair();

    {
        let ledger = open_file_ledger(&path, LedgerOptions::default()).await;
        give_consent(&ledger, &keypair, "first").await;
        give_consent(&ledger, &keypair, "second").await;
    }

    let mut raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    raw["blocks"][2]["payload"]["scopes"] = Value::from("everything");
    std::fs::write(&path, serde_json::to_vec_pretty(&raw).unwrap()).unwrap();

    let ledger = open_file_ledger(&path, LedgerOptions::default()).await;
    let result = ledger.verify().await;
    assert!(!result.valid);
    assert_eq!(result.index, Some(2));
    assert_eq!(result.reason.as_deref(), Some("hash mismatch"));

    let hardened = LedgerOptions {
        insecure: false,
        hardened: true,
    };
    let ledger = open_file_ledger(&path, hardened).await;
    let blocked = ledger.give(signed_give(&keypair, "sms", FAR_EXPIRY, "third")).await;
    assert!(matches!(blocked, Err(LedgerError::Integrity { index: 2, .. })));
}

/// Write two grants to a fresh file ledger, apply `edit` to the raw document,
/// and reopen it.
async fn reopen_after_edit(edit: impl FnOnce(&mut Value)) -> (tempfile::TempDir, ConsentLedger) {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("ledger.json");
    let keypair = create_test_keypair();

    {
        let ledger = open_file_ledger(&path, LedgerOptions::default()).await;
        give_consent(&ledger, &keypair, "first").await;
        give_consent(&ledger, &keypair, "second").await;
    }

    let mut raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    edit(&mut raw);
    std::fs::write(&path, serde_json::to_vec_pretty(&raw).unwrap()).unwrap();

    let ledger = open_file_ledger(&path, LedgerOptions::default()).await;
    (temp_dir, ledger)
}

#[tokio::test]
async fn test_extra_payload_key_is_detected_and_kept() {
    let (temp_dir, ledger) = reopen_after_edit(|raw| {
        raw["blocks"][1]["payload"]["purpose"] = Value::from("marketing");
    })
    .await;

    let result = ledger.verify().await;
    assert!(!result.valid);
    assert_eq!(result.index, Some(1));
    assert_eq!(result.reason.as_deref(), Some("hash mismatch"));

    // Appending rewrites the file; the edited payload must survive verbatim.
    let keypair = create_test_keypair();
    give_consent(&ledger, &keypair, "third").await;
    let path = temp_dir.path().join("ledger.json");
    let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["blocks"][1]["payload"]["purpose"], "marketing");
    assert_eq!(raw["blocks"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_retyped_payload_value_is_located() {
    let (_temp_dir, ledger) = reopen_after_edit(|raw| {
        raw["blocks"][2]["payload"]["scopes"] = serde_json::json!(["sms", "email"]);
    })
    .await;

    assert_eq!(ledger.len().await, 3);
    let result = ledger.verify().await;
    assert!(!result.valid);
    assert_eq!(result.index, Some(2));
}

#[tokio::test]
async fn test_changed_block_type_is_located() {
    let (_temp_dir, ledger) = reopen_after_edit(|raw| {
        raw["blocks"][1]["type"] = Value::from("REVOKE");
    })
    .await;

    let result = ledger.verify().await;
    assert!(!result.valid);
    assert_eq!(result.index, Some(1));
}

#[tokio::test]
async fn test_unreadable_file_fails_open() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("ledger.json");
    std::fs::write(&path, "{ not json").unwrap();

    let storage = Arc::new(JsonFileStorage::new(&path));
    assert!(storage.load().await.is_err());

    let result = ConsentLedger::open(storage, LedgerOptions::default()).await;
    assert!(matches!(result, Err(LedgerError::Storage(_))));
}
