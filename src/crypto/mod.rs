//! Cryptographic primitives for the consent ledger
//!
//! Canonical JSON serialization and SHA-256 hashing live in [`canonical`];
//! secp256k1 key handling, signing and verification live in [`signatures`].

pub mod canonical;
pub mod signatures;

pub use canonical::{canonicalize, message_hash, sha256_hex};
pub use signatures::{CryptoProvider, SubjectKeypair};
