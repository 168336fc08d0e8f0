use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Arg, ArgAction, Command};
use std::path::Path;
use tracing::{error, info};

use consent_ledger::crypto::CryptoProvider;
use consent_ledger::ledger::{find_tampered_blocks, Chain, VerifyResult};
use consent_ledger::storage::{JsonFileStorage, StorageAdapter};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("verify-ledger")
        .version("0.1.0")
        .about("Verify consent ledger integrity")
        .arg(
            Arg::new("ledger-path")
                .short('l')
                .long("ledger-path")
                .value_name("PATH")
                .help("Path to ledger file")
                .default_value("data/ledger.json"),
        )
        .arg(
            Arg::new("consent")
                .short('c')
                .long("consent")
                .value_name("CONSENT_ID")
                .help("Also print status and proof for this consent"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let ledger_path = matches
        .get_one::<String>("ledger-path")
        .cloned()
        .unwrap_or_else(|| "data/ledger.json".to_string());
    let consent_id = matches.get_one::<String>("consent");
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let level = if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = verify_ledger_file(&ledger_path, consent_id, verbose, quiet).await {
        error!("Ledger verification failed: {}", e);
        std::process::exit(1);
    }

    if !quiet {
        println!("✓ Ledger verification completed successfully");
    }

    Ok(())
}

async fn verify_ledger_file(
    ledger_path: &str,
    consent_id: Option<&String>,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    info!("Verifying ledger: {}", ledger_path);

    // Loading a missing file would bootstrap a fresh ledger
    if !Path::new(ledger_path).exists() {
        return Err(anyhow!("Ledger file not found: {}", ledger_path));
    }

    let blocks = JsonFileStorage::new(ledger_path).load().await?;
    let chain = Chain::from_blocks(blocks)?;
    let crypto = CryptoProvider::new();

    if verbose {
        println!("Loaded {} block(s)", chain.len());
    }

    let result = VerifyResult::from(chain.verify_integrity(&crypto));

    if let Some(consent_id) = consent_id {
        let status = chain.status_at(consent_id, Utc::now().timestamp());
        let proof = chain.proof(consent_id);
        if !quiet {
            println!("Status:\n{}", serde_json::to_string_pretty(&status)?);
            println!("Proof:\n{}", serde_json::to_string_pretty(&proof)?);
        }
    }

    if verbose {
        println!("\nLedger Summary:");
        println!("  Total blocks: {}", chain.len());
        println!("  First block: {}", chain.blocks()[0].timestamp);
        println!("  Tip: {}", chain.tip().summary());
        println!("  Tip hash: {}", chain.tip().hash);
    }

    if !result.valid {
        let tampered = find_tampered_blocks(chain.blocks());
        if !tampered.is_empty() {
            error!("Blocks with mismatched hashes: {:?}", tampered);
        }
        return Err(anyhow!(
            "block {}: {}",
            result.index.unwrap_or_default(),
            result.reason.unwrap_or_default()
        ));
    }

    if verbose {
        println!("✓ Hash chain and signatures verified");
    }

    Ok(())
}
