use rollcall_core::{decode_image, BoundingBox, EncodeError, Embedding, FaceEncoder};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// One detected face and its encoding.
#[derive(Debug, Clone)]
pub struct EncodedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// How many of the detected faces to encode.
#[derive(Debug, Clone, Copy)]
enum Take {
    /// Only the most confident face.
    First,
    All,
}

/// A request sent from HTTP handlers to the engine thread.
struct EngineRequest {
    image: Vec<u8>,
    take: Take,
    reply: oneshot::Sender<Result<Vec<EncodedFace>, EngineError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode `image` and encode its most confident face, if any.
    pub async fn encode_first(&self, image: Vec<u8>) -> Result<Option<EncodedFace>, EngineError> {
        let faces = self.request(image, Take::First).await?;
        Ok(faces.into_iter().next())
    }

    /// Decode `image` and encode every detected face, most confident first.
    pub async fn encode_all(&self, image: Vec<u8>) -> Result<Vec<EncodedFace>, EngineError> {
        self.request(image, Take::All).await
    }

    async fn request(&self, image: Vec<u8>, take: Take) -> Result<Vec<EncodedFace>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest {
                image,
                take,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread that owns `encoder`.
///
/// Inference sessions need exclusive access, so requests are served one at
/// a time. The thread exits once every handle has been dropped.
pub fn spawn_engine(mut encoder: Box<dyn FaceEncoder>) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                let result = run_encode(encoder.as_mut(), &req.image, req.take);
                // Receiver gone means the HTTP request was dropped.
                let _ = req.reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn run_encode(
    encoder: &mut dyn FaceEncoder,
    bytes: &[u8],
    take: Take,
) -> Result<Vec<EncodedFace>, EngineError> {
    let image = decode_image(bytes)?;
    let mut faces = encoder.detect(&image)?;

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        detected = faces.len(),
        "faces detected"
    );

    if matches!(take, Take::First) {
        faces.truncate(1);
    }

    faces
        .into_iter()
        .map(|bbox| -> Result<EncodedFace, EngineError> {
            let embedding = encoder.encode(&image, &bbox)?;
            Ok(EncodedFace { bbox, embedding })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tiles_png, TileEncoder, BLACK, BLUE, RED};

    #[tokio::test]
    async fn test_encode_all_returns_every_face_in_order() {
        let engine = spawn_engine(Box::new(TileEncoder)).unwrap();
        let faces = engine.encode_all(tiles_png(&[RED, BLACK, BLUE])).await.unwrap();

        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].embedding.values, vec![255.0, 0.0, 0.0]);
        assert_eq!(faces[1].embedding.values, vec![0.0, 0.0, 255.0]);
    }

    #[tokio::test]
    async fn test_encode_first_takes_one_face() {
        let engine = spawn_engine(Box::new(TileEncoder)).unwrap();
        let face = engine.encode_first(tiles_png(&[BLUE, RED])).await.unwrap();
        assert_eq!(face.map(|f| f.embedding.values), Some(vec![0.0, 0.0, 255.0]));

        let none = engine.encode_first(tiles_png(&[BLACK])).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_upload() {
        let engine = spawn_engine(Box::new(TileEncoder)).unwrap();
        let err = engine.encode_all(b"GIF89a-truncated".to_vec()).await.unwrap_err();
        assert!(matches!(err, EngineError::Encode(EncodeError::Decode(_))), "{err:?}");
    }
}
