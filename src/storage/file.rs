//! JSON file storage backend

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::ledger::Block;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::{LedgerDocument, StorageAdapter};

#[derive(Serialize)]
struct LedgerDocumentRef<'a> {
    blocks: &'a [Block],
}

/// Whole-ledger JSON document on disk.
///
/// Writes go to a sibling `.tmp` file which is fsynced and then renamed over
/// the target, so readers of the file never observe a partial ledger.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn write_document(&self, blocks: &[Block]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(&LedgerDocumentRef { blocks })?;
        let temp_path = self.temp_path();

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&json).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for JsonFileStorage {
    async fn load(&self) -> StorageResult<Vec<Block>> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                let document: LedgerDocument = serde_json::from_slice(&bytes)?;
                if document.blocks.is_empty() {
                    return Err(StorageError::Corrupt(format!(
                        "{} contains no blocks",
                        self.path.display()
                    )));
                }
                debug!(
                    "Loaded {} block(s) from {}",
                    document.blocks.len(),
                    self.path.display()
                );
                Ok(document.blocks)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let blocks = vec![Block::genesis()];
                self.write_document(&blocks).await?;
                info!("Created new ledger at {}", self.path.display());
                Ok(blocks)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, blocks: &[Block]) -> StorageResult<()> {
        self.write_document(blocks).await
    }
}
