use rollcall_core::MatchPolicy;
use rollcall_store::S3StoreConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_BUCKET: &str = "attendance-system";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Where registered encodings live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    S3,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(StoreBackend::S3),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}' (expected s3 or memory)")),
        }
    }
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (default: 127.0.0.1:5000).
    pub bind: SocketAddr,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    pub store: StoreBackend,
    /// Bucket and endpoint, used when `store` is S3.
    pub s3: S3StoreConfig,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    pub match_policy: MatchPolicy,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = lookup("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(rollcall_core::default_model_dir);

        let s3 = S3StoreConfig {
            bucket: lookup("ROLLCALL_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            endpoint: lookup("ROLLCALL_S3_ENDPOINT").filter(|v| !v.is_empty()),
            region: lookup("ROLLCALL_S3_REGION").filter(|v| !v.is_empty()),
            force_path_style: lookup("ROLLCALL_S3_PATH_STYLE")
                .map(|v| v != "0" && !v.is_empty())
                .unwrap_or(false),
        };

        Self {
            bind: parse_or(&lookup, "ROLLCALL_BIND", || {
                SocketAddr::from(([127, 0, 0, 1], 5000))
            }),
            model_dir,
            store: parse_or(&lookup, "ROLLCALL_STORE", || StoreBackend::S3),
            s3,
            similarity_threshold: parse_or(&lookup, "ROLLCALL_SIMILARITY_THRESHOLD", || 0.40),
            match_policy: parse_or(&lookup, "ROLLCALL_MATCH_POLICY", MatchPolicy::default),
            max_upload_bytes: parse_or(&lookup, "ROLLCALL_MAX_UPLOAD_BYTES", || {
                DEFAULT_MAX_UPLOAD_BYTES
            }),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

/// Parse `key`, falling back to `default` when unset or unparseable.
fn parse_or<T, E>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: impl FnOnce() -> T) -> T
where
    T: FromStr<Err = E>,
    E: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default();
    };
    match raw.parse() {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(key, value = %raw, error = %err, "ignoring invalid setting");
            default()
        }
    }
}
