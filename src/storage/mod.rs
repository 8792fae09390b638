// Blob storage: prefix-listable key/value store for partition snapshots

pub mod blob_fs;
pub mod in_memory;
pub mod partitions;

use crate::error::Result;
use async_trait::async_trait;

pub use blob_fs::FsBlobStore;
pub use in_memory::InMemoryBlobStore;

/// Prefix-listable key/value blob store holding the CSV partition
/// snapshots. Keys follow `stage_prefix/YYYY_MM/stem_YYYY_MM.csv`.
///
/// `get` on an absent key must return `PipelineError::MissingPartition`
/// so merge can treat "no prior partition" as a normal first write while
/// every other storage fault stays fatal.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}
