//! Image decoding and the detector + recognizer pair behind one trait.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection and encoding, treated as an opaque oracle by callers.
///
/// Implementations hold inference state and are driven from a single
/// thread, hence `&mut self`.
pub trait FaceEncoder: Send {
    /// Detect faces, most confident first.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EncodeError>;

    /// Compute the encoding of one face returned by [`detect`](Self::detect).
    fn encode(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, EncodeError>;
}

/// SCRFD detector + ArcFace recognizer.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EncodeError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, EncodeError> {
        Ok(self.recognizer.extract(image, face)?)
    }
}

/// Decode an uploaded image (any format the `image` crate sniffs) and
/// normalize it to three-channel RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, EncodeError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(decoded.to_rgb8())
}
