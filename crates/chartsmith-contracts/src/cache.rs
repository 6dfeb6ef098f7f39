use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::dataset::signature::{fingerprint, DatasetSignature};
use crate::recs::RawRecommendation;

pub const CACHE_SCHEMA_VERSION: u64 = 1;

/// Derived once per request and discarded. The question and signature ride
/// along so cache reads can verify the entry actually belongs to this
/// request instead of trusting the fingerprint alone.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    pub fingerprint: String,
    pub question: String,
    pub signature: DatasetSignature,
}

impl CacheKey {
    pub fn derive(question: &str, signature: &DatasetSignature) -> Self {
        Self {
            fingerprint: fingerprint(question, signature),
            question: question.to_string(),
            signature: signature.clone(),
        }
    }
}

/// Flat on-disk store: one JSON file per fingerprint, no eviction, no TTL.
/// Read and write failures degrade to a miss or a no-op — caching is an
/// optimization, not a correctness requirement.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<RawRecommendation> {
        let path = self.entry_path(&key.fingerprint);
        let entry = read_json_object(&path)?;
        if !entry_matches(&entry, key) {
            warn!(
                fingerprint = %key.fingerprint,
                "cache entry does not match its request, treating as miss"
            );
            return None;
        }
        entry
            .get("recommendation")
            .and_then(Value::as_object)
            .cloned()
            .map(RawRecommendation)
    }

    pub fn store(&self, key: &CacheKey, raw: &RawRecommendation) {
        let mut entry = Map::new();
        entry.insert(
            "schema_version".to_string(),
            Value::Number(CACHE_SCHEMA_VERSION.into()),
        );
        entry.insert(
            "fingerprint".to_string(),
            Value::String(key.fingerprint.clone()),
        );
        entry.insert("question".to_string(), Value::String(key.question.clone()));
        entry.insert(
            "signature".to_string(),
            serde_json::to_value(&key.signature).unwrap_or(Value::Null),
        );
        entry.insert(
            "cached_at".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        entry.insert(
            "recommendation".to_string(),
            Value::Object(raw.as_map().clone()),
        );

        if let Err(err) = write_json_object(&self.entry_path(&key.fingerprint), &entry) {
            warn!(fingerprint = %key.fingerprint, "failed to write cache entry: {err}");
        }
    }

    /// Removes every entry file and returns how many were deleted.
    pub fn clear(&self) -> usize {
        let Ok(listing) = fs::read_dir(&self.dir) else {
            return 0;
        };
        let mut removed = 0usize;
        for item in listing.flatten() {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && fs::remove_file(&path).is_ok()
            {
                removed += 1;
            }
        }
        removed
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }
}

fn entry_matches(entry: &Map<String, Value>, key: &CacheKey) -> bool {
    let question_matches = entry.get("question").and_then(Value::as_str) == Some(&key.question);
    let signature_matches = entry
        .get("signature")
        .cloned()
        .and_then(|value| serde_json::from_value::<DatasetSignature>(value).ok())
        .is_some_and(|signature| signature == key.signature);
    question_matches && signature_matches
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let rendered = serde_json::to_string_pretty(&Value::Object(payload.clone()))
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, rendered)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use crate::dataset::signature::DatasetSignature;

    use super::{CacheKey, ResultCache};
    use crate::recs::RawRecommendation;

    fn signature() -> DatasetSignature {
        DatasetSignature {
            columns: vec!["price".to_string(), "size".to_string()],
            rows: 5,
            cols: 2,
        }
    }

    fn raw(value: Value) -> RawRecommendation {
        RawRecommendation(value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn store_then_lookup_round_trips() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let cache = ResultCache::new(temp.path().join("cache"));
        let key = CacheKey::derive("What drives price?", &signature());
        let payload = raw(json!({"analysis": "size matters", "visualizations": []}));

        cache.store(&key, &payload);
        assert_eq!(cache.lookup(&key), Some(payload));
        Ok(())
    }

    #[test]
    fn unknown_fingerprint_is_a_miss_not_an_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let cache = ResultCache::new(temp.path());
        let key = CacheKey::derive("never stored", &signature());
        assert_eq!(cache.lookup(&key), None);
        Ok(())
    }

    #[test]
    fn corrupted_entry_degrades_to_miss() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let cache = ResultCache::new(temp.path());
        let key = CacheKey::derive("What drives price?", &signature());
        std::fs::write(
            temp.path().join(format!("{}.json", key.fingerprint)),
            "not json at all",
        )?;
        assert_eq!(cache.lookup(&key), None);
        Ok(())
    }

    #[test]
    fn colliding_entry_with_different_question_is_a_miss() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let cache = ResultCache::new(temp.path());
        let key = CacheKey::derive("What drives price?", &signature());
        cache.store(&key, &raw(json!({"visualizations": []})));

        // Same fingerprint, different question: a simulated hash collision.
        let collided = CacheKey {
            fingerprint: key.fingerprint.clone(),
            question: "What drives size?".to_string(),
            signature: signature(),
        };
        assert_eq!(cache.lookup(&collided), None);
        assert!(cache.lookup(&key).is_some());
        Ok(())
    }

    #[test]
    fn clear_removes_all_entries_and_reports_count() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let cache = ResultCache::new(temp.path());
        for question in ["one", "two", "three"] {
            let key = CacheKey::derive(question, &signature());
            cache.store(&key, &raw(json!({"visualizations": []})));
        }

        assert_eq!(cache.clear(), 3);
        assert_eq!(cache.clear(), 0);
        let key = CacheKey::derive("one", &signature());
        assert_eq!(cache.lookup(&key), None);
        Ok(())
    }

    #[test]
    fn entry_records_question_and_signature() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let cache = ResultCache::new(temp.path());
        let key = CacheKey::derive("What drives price?", &signature());
        cache.store(&key, &raw(json!({"visualizations": []})));

        let path = temp.path().join(format!("{}.json", key.fingerprint));
        let parsed: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed["question"], json!("What drives price?"));
        assert_eq!(parsed["signature"]["rows"], json!(5));
        Ok(())
    }
}
