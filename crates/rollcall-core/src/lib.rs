//! rollcall-core: Face detection, encoding and matching.
//!
//! SCRFD finds faces, ArcFace turns each aligned face into a 512-d
//! encoding, and a [`Matcher`] compares encodings against the gallery of
//! registered faces. Both models run on ONNX Runtime (CPU).

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use detector::FaceDetector;
pub use encoder::{decode_image, EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use recognizer::FaceRecognizer;
pub use types::{
    BoundingBox, Embedding, FirstMatchMatcher, MatchPolicy, MatchResult, Matcher,
    NearestMatcher, RegisteredFace,
};

/// Default location of the ONNX model files: `$XDG_DATA_HOME/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
        .join("models")
}
