use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ordered column list plus shape. Exists only long enough to derive a
/// cache fingerprint; never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSignature {
    pub columns: Vec<String>,
    pub rows: usize,
    pub cols: usize,
}

impl DatasetSignature {
    fn shape_text(&self) -> String {
        format!("{:?}_({}, {})", self.columns, self.rows, self.cols)
    }
}

/// Deterministic cache key for a (question, dataset signature) pair:
/// `hash(question) ++ "_" ++ hash(columns ++ shape)`, each hash being the
/// first 8 hex characters of a SHA-256 digest.
pub fn fingerprint(question: &str, signature: &DatasetSignature) -> String {
    format!(
        "{}_{}",
        short_hash(question.as_bytes()),
        short_hash(signature.shape_text().as_bytes())
    )
}

fn short_hash(bytes: &[u8]) -> String {
    let mut encoded = hex::encode(Sha256::digest(bytes));
    encoded.truncate(8);
    encoded
}
