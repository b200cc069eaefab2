//! S3-compatible blob store backend (AWS, MinIO, GCS interop, ...).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use rollcall_core::{Embedding, RegisteredFace};

use crate::blob::{self, BlobRecord, BLOB_CONTENT_TYPE, FACES_PREFIX};
use crate::{FaceStore, StoreError};

/// Connection settings. Credentials come from the AWS default provider chain.
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub bucket: String,
    /// Custom endpoint for non-AWS services (e.g., `http://localhost:9000`).
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Path-style addressing (`endpoint/bucket/key`), needed by most self-hosted services.
    pub force_path_style: bool,
}

/// Face store backed by one bucket. The client is created once and shared.
#[derive(Debug, Clone)]
pub struct S3FaceStore {
    client: Client,
    bucket: String,
}

impl S3FaceStore {
    /// Build the SDK client from the environment plus `config` overrides.
    pub async fn connect(config: &S3StoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let s3_config = S3ConfigBuilder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint,
            path_style = config.force_path_style,
            "S3 face store configured"
        );

        Self::with_client(Client::from_conf(s3_config), config.bucket.clone())
    }

    pub fn with_client(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(FACES_PREFIX)
                .max_keys(1000);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let result = request.send().await.map_err(|e| StoreError::List {
                prefix: FACES_PREFIX.to_string(),
                message: e.to_string(),
            })?;

            keys.extend(result.contents().iter().filter_map(|obj| obj.key().map(str::to_string)));

            if result.is_truncated().unwrap_or(false) {
                continuation_token = result.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let download_err = |message: String| StoreError::Download {
            key: key.to_string(),
            message,
        };

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let data = result
            .body
            .collect()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        Ok(data.into_bytes().to_vec())
    }
}

#[async_trait]
impl FaceStore for S3FaceStore {
    async fn put(&self, name: &str, embedding: &Embedding) -> Result<RegisteredFace, StoreError> {
        let key = blob::blob_key(name);
        let record = BlobRecord::now(embedding.clone());
        let body = blob::encode(&record)?;

        tracing::info!(bucket = %self.bucket, %key, bytes = body.len(), "uploading face encoding");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(BLOB_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                key: key.clone(),
                message: e.to_string(),
            })?;

        Ok(record.into_face(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<RegisteredFace>, StoreError> {
        let keys = self.list_keys().await?;
        let mut faces = Vec::with_capacity(keys.len());

        for key in &keys {
            let Some(name) = blob::name_from_key(key) else {
                tracing::debug!(%key, "skipping non-encoding blob");
                continue;
            };
            let bytes = self.download(key).await?;
            faces.push(blob::decode(key, &bytes)?.into_face(name.to_string()));
        }

        tracing::debug!(bucket = %self.bucket, count = faces.len(), "listed registered faces");
        Ok(faces)
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
