//! rollcall-store: Persistence of registered face encodings.
//!
//! Every registered name is one blob at `faces/<name>.json`. Writing a
//! name again replaces its blob; nothing here deletes blobs.

pub mod blob;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use rollcall_core::{Embedding, RegisteredFace};
use thiserror::Error;

pub use memory::MemoryFaceStore;
pub use s3::{S3FaceStore, S3StoreConfig};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to upload {key}: {message}")]
    Upload { key: String, message: String },
    #[error("failed to download {key}: {message}")]
    Download { key: String, message: String },
    #[error("failed to list {prefix}: {message}")]
    List { prefix: String, message: String },
    #[error("blob {key} is not a valid face encoding: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize face encoding: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Remote name → encoding map.
#[async_trait]
pub trait FaceStore: Send + Sync {
    /// Persist `embedding` under `name`, replacing any previous encoding.
    async fn put(&self, name: &str, embedding: &Embedding) -> Result<RegisteredFace, StoreError>;

    /// Every registered face, in key order.
    async fn list(&self) -> Result<Vec<RegisteredFace>, StoreError>;

    /// Short backend identifier for status reporting.
    fn backend(&self) -> &'static str;
}
