//! Ledger persistence
//!
//! The core only needs to load the whole block sequence and durably overwrite
//! it. Backends:
//!
//! | Backend           | Use Case                   |
//! |-------------------|----------------------------|
//! | `InMemoryStorage` | Unit tests, embedding      |
//! | `JsonFileStorage` | Single-node deployments    |

mod error;
mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ledger::Block;

pub use error::{StorageError, StorageResult};
pub use file::JsonFileStorage;
pub use memory::InMemoryStorage;

/// Persisted document layout: `{"blocks": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerDocument {
    pub blocks: Vec<Block>,
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Load the ordered block sequence.
    ///
    /// When no state exists yet, implementations persist and return a
    /// sequence holding only the genesis block.
    async fn load(&self) -> StorageResult<Vec<Block>>;

    /// Durably replace the stored sequence with `blocks`.
    ///
    /// Returning `Ok` means the write survives a crash.
    async fn save(&self, blocks: &[Block]) -> StorageResult<()>;
}
