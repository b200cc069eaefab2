//! Registration and recognition on top of the engine and the face store.

use rollcall_core::{EncodeError, MatchPolicy, Matcher, RegisteredFace};
use rollcall_store::{FaceStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

use crate::engine::{EngineError, EngineHandle};

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("{0}")]
    MissingInput(&'static str),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("no registered faces")]
    StoreEmpty,
    #[error("upload exceeds the request body limit")]
    UploadTooLarge,
    #[error("uploaded file is not a readable image: {0}")]
    InvalidImage(String),
    #[error("engine error: {0}")]
    Engine(EngineError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<EngineError> for AttendanceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Encode(EncodeError::Decode(e)) => AttendanceError::InvalidImage(e.to_string()),
            other => AttendanceError::Engine(other),
        }
    }
}

/// Outcome for one face found in a recognition image.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    /// Registered name, or `None` for an unknown face.
    pub name: Option<String>,
    pub similarity: f32,
}

pub struct AttendanceService {
    engine: EngineHandle,
    store: Arc<dyn FaceStore>,
    policy: MatchPolicy,
    threshold: f32,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle, store: Arc<dyn FaceStore>, policy: MatchPolicy, threshold: f32) -> Self {
        Self {
            engine,
            store,
            policy,
            threshold,
        }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Encode the most confident face in `image` and store it under `name`,
    /// replacing any earlier registration of that name.
    pub async fn register(&self, name: &str, image: Vec<u8>) -> Result<RegisteredFace, AttendanceError> {
        let face = self
            .engine
            .encode_first(image)
            .await?
            .ok_or(AttendanceError::NoFaceDetected)?;

        let registered = self.store.put(name, &face.embedding).await?;
        tracing::info!(
            name,
            confidence = face.bbox.confidence,
            backend = self.store.backend(),
            "face registered"
        );
        Ok(registered)
    }

    /// Match every face in `image` against the registered gallery.
    ///
    /// The gallery is fetched first, so an empty store is reported even
    /// when the image holds no face.
    pub async fn recognize(&self, image: Vec<u8>) -> Result<Vec<Sighting>, AttendanceError> {
        let gallery = self.store.list().await?;
        if gallery.is_empty() {
            return Err(AttendanceError::StoreEmpty);
        }

        let faces = self.engine.encode_all(image).await?;
        if faces.is_empty() {
            return Err(AttendanceError::NoFaceDetected);
        }

        let sightings: Vec<Sighting> = faces
            .iter()
            .map(|face| {
                let result = self.policy.compare(&face.embedding, &gallery, self.threshold);
                Sighting {
                    name: result.name,
                    similarity: result.similarity,
                }
            })
            .collect();

        tracing::info!(
            faces = sightings.len(),
            known = sightings.iter().filter(|s| s.name.is_some()).count(),
            gallery = gallery.len(),
            policy = %self.policy,
            "recognition finished"
        );
        Ok(sightings)
    }

    /// Registered names in store-listing order.
    pub async fn registered_names(&self) -> Result<Vec<String>, AttendanceError> {
        let gallery = self.store.list().await?;
        Ok(gallery.into_iter().map(|face| face.name).collect())
    }
}
