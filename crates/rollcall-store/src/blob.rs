//! Blob naming and the on-store record format.

use chrono::{SecondsFormat, Utc};
use rollcall_core::{Embedding, RegisteredFace};
use serde::{Deserialize, Serialize};

use crate::StoreError;

pub const FACES_PREFIX: &str = "faces/";
pub const BLOB_EXTENSION: &str = ".json";
pub const BLOB_CONTENT_TYPE: &str = "application/octet-stream";

/// Body of one `faces/<name>.json` blob. The name lives in the key only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRecord {
    pub embedding: Embedding,
    pub registered_at: String,
}

impl BlobRecord {
    pub fn now(embedding: Embedding) -> Self {
        Self {
            embedding,
            registered_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn into_face(self, name: String) -> RegisteredFace {
        RegisteredFace {
            name,
            embedding: self.embedding,
            registered_at: self.registered_at,
        }
    }
}

/// `faces/<name>.json`. The name is used verbatim.
pub fn blob_key(name: &str) -> String {
    format!("{FACES_PREFIX}{name}{BLOB_EXTENSION}")
}

/// Inverse of [`blob_key`]. `None` for keys outside the faces prefix or
/// with another extension.
pub fn name_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(FACES_PREFIX)?.strip_suffix(BLOB_EXTENSION)
}

pub fn encode(record: &BlobRecord) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(record)?)
}

pub fn decode(key: &str, bytes: &[u8]) -> Result<BlobRecord, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}
