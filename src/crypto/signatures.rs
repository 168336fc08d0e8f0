use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Hex-encoded secp256k1 keypair for a consenting subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectKeypair {
    pub private_key: String,
    pub public_key: String,
}

/// secp256k1 signing and verification over hex-encoded message hashes.
///
/// Public keys travel as compressed 33-byte hex, signatures as 64-byte
/// compact hex. Signing uses RFC 6979 deterministic nonces.
#[derive(Clone)]
pub struct CryptoProvider {
    secp: Secp256k1<All>,
}

impl CryptoProvider {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Fresh private key from the OS RNG, hex.
    pub fn generate_private_key(&self) -> String {
        let secret_key = SecretKey::new(&mut OsRng);
        hex::encode(secret_key.secret_bytes())
    }

    /// Compressed public key for a hex private key.
    pub fn derive_public_key(&self, private_key: &str) -> Result<String, LedgerError> {
        let secret_key = parse_secret_key(private_key)?;
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);
        Ok(hex::encode(public_key.serialize()))
    }

    pub fn generate_keypair(&self) -> Result<SubjectKeypair, LedgerError> {
        let private_key = self.generate_private_key();
        let public_key = self.derive_public_key(&private_key)?;
        Ok(SubjectKeypair {
            private_key,
            public_key,
        })
    }

    /// Sign a 32-byte message hash given as hex. Returns the compact signature as hex.
    pub fn sign(&self, private_key: &str, message_hash: &str) -> Result<String, LedgerError> {
        let secret_key = parse_secret_key(private_key)?;
        let message = parse_message(message_hash)?;
        let signature = self.secp.sign_ecdsa(&message, &secret_key);
        Ok(hex::encode(signature.serialize_compact()))
    }

    /// Verify a compact signature over a message hash.
    ///
    /// Malformed hex, wrong lengths and invalid points are encoding errors. A
    /// well-formed signature that does not match yields `Ok(false)`.
    pub fn verify(
        &self,
        public_key: &str,
        message_hash: &str,
        signature: &str,
    ) -> Result<bool, LedgerError> {
        let public_key = parse_public_key(public_key)?;
        let message = parse_message(message_hash)?;
        let signature = parse_signature(signature)?;

        match self.secp.verify_ecdsa(&message, &signature, &public_key) {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

impl Default for CryptoProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, LedgerError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).map_err(|e| LedgerError::invalid_encoding(field, e))
}

fn parse_secret_key(value: &str) -> Result<SecretKey, LedgerError> {
    let bytes = decode_hex("private key", value)?;
    SecretKey::from_slice(&bytes).map_err(|e| LedgerError::invalid_encoding("private key", e))
}

fn parse_public_key(value: &str) -> Result<PublicKey, LedgerError> {
    let bytes = decode_hex("public key", value)?;
    PublicKey::from_slice(&bytes).map_err(|e| LedgerError::invalid_encoding("public key", e))
}

fn parse_message(value: &str) -> Result<Message, LedgerError> {
    let bytes = decode_hex("message hash", value)?;
    if bytes.len() != 32 {
        return Err(LedgerError::invalid_encoding(
            "message hash",
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }
    Message::from_digest_slice(&bytes).map_err(|e| LedgerError::invalid_encoding("message hash", e))
}

fn parse_signature(value: &str) -> Result<Signature, LedgerError> {
    let bytes = decode_hex("signature", value)?;
    if bytes.len() != 64 {
        return Err(LedgerError::invalid_encoding(
            "signature",
            format!("expected 64 bytes, got {}", bytes.len()),
        ));
    }
    Signature::from_compact(&bytes).map_err(|e| LedgerError::invalid_encoding("signature", e))
}
