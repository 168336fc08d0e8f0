//! Subject key and request signing tool
//!
//! Generates secp256k1 subject keys and produces signed request bodies for
//! `POST /consents/give` and `POST /consents/revoke`.

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;

use consent_ledger::crypto::{message_hash, CryptoProvider};
use consent_ledger::ledger::message::{derive_consent_id, give_message};
use consent_ledger::ledger::{GiveRequest, RevokeRequest};

#[derive(Parser)]
#[command(name = "consent-keys")]
#[command(about = "Manage consent subject keys and sign ledger requests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new subject keypair
    Generate,
    /// Derive the compressed public key for a private key
    Pubkey {
        /// Private key (32-byte hex)
        #[arg(short, long)]
        private_key: String,
    },
    /// Produce a signed GIVE request body
    SignGive {
        #[arg(short, long)]
        private_key: String,

        /// Comma-separated scopes, e.g. "sms,email"
        #[arg(short, long)]
        scopes: String,

        /// Absolute expiry (Unix seconds)
        #[arg(short, long)]
        expiry: Option<i64>,

        /// Seconds from now, used when --expiry is not given
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,

        /// Hash of the data the consent covers
        #[arg(short, long)]
        data_hash: String,
    },
    /// Produce a signed REVOKE request body
    SignRevoke {
        #[arg(short, long)]
        private_key: String,

        #[arg(short, long)]
        consent_id: String,
    },
    /// Compute the consentId a GIVE would be recorded under
    ConsentId {
        #[arg(long)]
        public_key: String,

        #[arg(short, long)]
        scopes: String,

        #[arg(short, long)]
        expiry: i64,

        #[arg(short, long)]
        data_hash: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let crypto = CryptoProvider::new();

    let output = match cli.command {
        Commands::Generate => serde_json::to_value(crypto.generate_keypair()?)?,
        Commands::Pubkey { private_key } => json!({
            "publicKey": crypto.derive_public_key(&private_key)?,
        }),
        Commands::SignGive {
            private_key,
            scopes,
            expiry,
            ttl_secs,
            data_hash,
        } => {
            let expiry = expiry.unwrap_or_else(|| Utc::now().timestamp() + ttl_secs);
            if expiry <= 0 {
                return Err(anyhow!("expiry must be a positive Unix timestamp"));
            }
            let request = GiveRequest::signed(&crypto, &private_key, &scopes, expiry, &data_hash)?;
            serde_json::to_value(request)?
        }
        Commands::SignRevoke {
            private_key,
            consent_id,
        } => serde_json::to_value(RevokeRequest::signed(&crypto, &private_key, &consent_id)?)?,
        Commands::ConsentId {
            public_key,
            scopes,
            expiry,
            data_hash,
        } => {
            let hash = message_hash(&give_message(&scopes, expiry, &data_hash));
            json!({ "consentId": derive_consent_id(&hash, &public_key) })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
