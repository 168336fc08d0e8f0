//! Consent Ledger
//!
//! Hash-linked, append-only record of signed consent grants and revocations,
//! with integrity verification, status derivation and audit proofs.

pub mod block;
pub mod chain;
pub mod message;
pub mod proof;
pub mod service;
pub mod status;
pub mod verify;

pub use block::{Block, BlockBody, BlockType, GivePayload, RevokePayload, ZERO_HASH};
pub use chain::Chain;
pub use message::{GiveRequest, RevokeRequest};
pub use proof::ProofResult;
pub use service::{AppendReceipt, ConsentLedger, LedgerOptions};
pub use status::{ConsentState, StatusReason, StatusResult};
pub use verify::{find_tampered_blocks, verify_chain, ChainViolation, VerifyResult, ViolationKind};
