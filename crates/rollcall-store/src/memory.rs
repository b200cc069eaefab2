//! Process-local store with the same key layout and listing order as S3.

use async_trait::async_trait;
use rollcall_core::{Embedding, RegisteredFace};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::blob::{self, BlobRecord};
use crate::{FaceStore, StoreError};

/// Blobs kept in a sorted map, so listing follows lexicographic key order.
#[derive(Debug, Default)]
pub struct MemoryFaceStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryFaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw blob, bypassing the record codec.
    pub async fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.write().await.insert(key.into(), bytes);
    }
}

#[async_trait]
impl FaceStore for MemoryFaceStore {
    async fn put(&self, name: &str, embedding: &Embedding) -> Result<RegisteredFace, StoreError> {
        let key = blob::blob_key(name);
        let record = BlobRecord::now(embedding.clone());
        let bytes = blob::encode(&record)?;

        self.blobs.write().await.insert(key.clone(), bytes);
        tracing::debug!(%key, "stored face encoding in memory");

        Ok(record.into_face(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<RegisteredFace>, StoreError> {
        let blobs = self.blobs.read().await;
        let mut faces = Vec::with_capacity(blobs.len());

        for (key, bytes) in blobs.iter() {
            let Some(name) = blob::name_from_key(key) else {
                continue;
            };
            faces.push(blob::decode(key, bytes)?.into_face(name.to_string()));
        }

        Ok(faces)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
