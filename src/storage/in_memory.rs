use super::BlobStore;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory blob store implementation for development/testing.
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn key_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let blobs = self.blobs.lock().unwrap();
        let mut keys: Vec<String> = blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.lock().unwrap();
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::MissingPartition(key.to_string()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut blobs = self.blobs.lock().unwrap();
        debug!("Stored blob: {} ({} bytes)", key, bytes.len());
        blobs.insert(key.to_string(), bytes);
        Ok(())
    }
}
