use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face encoding (512-dimensional for ArcFace, L2-normalized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this encoding (e.g., "w600k_r50").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Whether `other` lives in the same embedding space: equal length and,
    /// when both are known, the same model version.
    pub fn is_comparable(&self, other: &Embedding) -> bool {
        if self.values.len() != other.values.len() {
            return false;
        }
        match (&self.model_version, &other.model_version) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// A named face encoding as persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredFace {
    pub name: String,
    pub embedding: Embedding,
    /// RFC 3339 timestamp of the registration that wrote this encoding.
    pub registered_at: String,
}

/// Result of matching one probe encoding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Similarity of the selected gallery entry, or of the closest one on a miss.
    pub similarity: f32,
    /// Name of the matched face (if any).
    pub name: Option<String>,
}

impl MatchResult {
    fn miss(similarity: f32) -> Self {
        Self {
            similarity,
            name: None,
        }
    }

    fn hit(face: &RegisteredFace, similarity: f32) -> Self {
        Self {
            similarity,
            name: Some(face.name.clone()),
        }
    }
}

/// Strategy for comparing a probe encoding against the registered gallery.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[RegisteredFace], threshold: f32) -> MatchResult;
}

/// Gallery entries the probe can be scored against, with their positions.
fn comparable<'a>(
    probe: &'a Embedding,
    gallery: &'a [RegisteredFace],
) -> impl Iterator<Item = (usize, &'a RegisteredFace)> + 'a {
    gallery.iter().enumerate().filter(move |(_, face)| {
        let ok = probe.is_comparable(&face.embedding);
        if !ok {
            tracing::warn!(
                name = %face.name,
                dims = face.embedding.values.len(),
                expected = probe.values.len(),
                model = ?face.embedding.model_version,
                "skipping encoding from a different model"
            );
        }
        ok
    })
}

/// Picks the gallery entry with the highest cosine similarity, if it clears
/// the threshold. Independent of gallery order.
pub struct NearestMatcher;

impl Matcher for NearestMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[RegisteredFace], threshold: f32) -> MatchResult {
        let mut best_sim = f32::NEG_INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, face) in comparable(probe, gallery) {
            let sim = probe.similarity(&face.embedding);
            if sim > best_sim {
                best_sim = sim;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_sim >= threshold => MatchResult::hit(&gallery[idx], best_sim),
            Some(_) => MatchResult::miss(best_sim),
            None => MatchResult::miss(0.0),
        }
    }
}

/// Picks the first gallery entry, in listing order, whose similarity clears
/// the threshold. A later, closer entry never wins.
pub struct FirstMatchMatcher;

impl Matcher for FirstMatchMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[RegisteredFace], threshold: f32) -> MatchResult {
        let mut best_sim = f32::NEG_INFINITY;

        for (_, face) in comparable(probe, gallery) {
            let sim = probe.similarity(&face.embedding);
            if sim >= threshold {
                return MatchResult::hit(face, sim);
            }
            best_sim = best_sim.max(sim);
        }

        MatchResult::miss(if best_sim == f32::NEG_INFINITY { 0.0 } else { best_sim })
    }
}

/// Which [`Matcher`] recognition uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    #[default]
    Nearest,
    First,
}

impl Matcher for MatchPolicy {
    fn compare(&self, probe: &Embedding, gallery: &[RegisteredFace], threshold: f32) -> MatchResult {
        match self {
            MatchPolicy::Nearest => NearestMatcher.compare(probe, gallery, threshold),
            MatchPolicy::First => FirstMatchMatcher.compare(probe, gallery, threshold),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(MatchPolicy::Nearest),
            "first" => Ok(MatchPolicy::First),
            other => Err(format!("unknown match policy '{other}' (expected nearest or first)")),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::Nearest => f.write_str("nearest"),
            MatchPolicy::First => f.write_str("first"),
        }
    }
}
