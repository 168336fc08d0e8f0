//! In-memory storage backend (for testing)

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ledger::Block;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::StorageAdapter;

/// In-memory storage for tests and embedding.
///
/// Not persistent; data is lost on drop. Save failures can be injected to
/// exercise all-or-nothing appends.
#[derive(Default)]
pub struct InMemoryStorage {
    blocks: Mutex<Option<Vec<Block>>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with an existing block sequence.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(Some(blocks)),
            ..Self::default()
        }
    }

    /// Currently persisted sequence, if anything was ever stored.
    pub async fn stored_blocks(&self) -> Option<Vec<Block>> {
        self.blocks.lock().await.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn load(&self) -> StorageResult<Vec<Block>> {
        let mut stored = self.blocks.lock().await;
        let blocks = stored.get_or_insert_with(|| vec![Block::genesis()]);
        Ok(blocks.clone())
    }

    async fn save(&self, blocks: &[Block]) -> StorageResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected save failure",
            )));
        }

        *self.blocks.lock().await = Some(blocks.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
