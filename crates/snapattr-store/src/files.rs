//! Directory-tree backend: one JSON file per record.
//!
//! Layout under the storage root:
//!
//! ```text
//! storage_root/
//!   {item_id}/
//!     attributes/{timestamp}.json
//!     raw_responses/{timestamp}.json
//!     lineage/{timestamp}.json
//! ```

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use snapattr_core::StorageConfig;

use crate::{ItemSummary, RecordKind, Store, StoreError, envelope, storage_id, validate_item_id};

const KINDS: [RecordKind; 3] = [
    RecordKind::Attributes,
    RecordKind::RawResponse,
    RecordKind::Lineage,
];

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StoreError> {
        if config.create_dirs {
            std::fs::create_dir_all(&config.storage_root)?;
        }
        Ok(Self {
            root: config.storage_root.clone(),
        })
    }

    /// Record files for one item and kind, sorted oldest first.
    ///
    /// Timestamps serialize to fixed width, so lexicographic filename
    /// order is chronological order.
    fn record_files(&self, item_id: &str, kind: RecordKind) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.root.join(item_id).join(kind.as_str());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl Store for FileStore {
    fn store(
        &self,
        item_id: &str,
        kind: RecordKind,
        data: &Value,
        metadata: &Value,
    ) -> Result<String, StoreError> {
        validate_item_id(item_id)?;
        let now = Utc::now();
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Micros, true);
        let id = storage_id(item_id, kind, &timestamp);

        let dir = self.root.join(item_id).join(kind.as_str());
        std::fs::create_dir_all(&dir)?;
        let file_name = format!("{}.json", now.format("%Y-%m-%dT%H-%M-%S%.6fZ"));
        let record = envelope(item_id, &id, &timestamp, data, metadata);
        std::fs::write(dir.join(&file_name), serde_json::to_vec_pretty(&record)?)?;

        debug!(item_id, kind = kind.as_str(), file = %file_name, "stored record");
        Ok(id)
    }

    fn latest(&self, item_id: &str, kind: RecordKind) -> Result<Option<Value>, StoreError> {
        validate_item_id(item_id)?;
        let Some(path) = self.record_files(item_id, kind)?.pop() else {
            return Ok(None);
        };
        let mut record: Value = serde_json::from_slice(&std::fs::read(&path)?)?;
        let data = record
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| StoreError::Corrupt(path.display().to_string()))?;
        Ok(Some(data))
    }

    fn list_items(&self) -> Result<Vec<ItemSummary>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let item_id = entry.file_name().to_string_lossy().into_owned();
            let mut counts = [0usize; 3];
            for (slot, kind) in counts.iter_mut().zip(KINDS) {
                *slot = self.record_files(&item_id, kind)?.len();
            }
            summaries.push(ItemSummary {
                item_id,
                has_attributes: counts[0] > 0,
                has_raw_response: counts[1] > 0,
                has_lineage: counts[2] > 0,
                record_count: counts.iter().sum(),
            });
        }
        summaries.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapattr_core::AttributeRecord;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileStore {
        FileStore::new(&StorageConfig {
            storage_root: dir.path().join("storage"),
            file_path: dir.path().join("unused.parquet"),
            create_dirs: true,
        })
        .unwrap()
    }

    fn record(brand_confidence: f64) -> AttributeRecord {
        let mut record = AttributeRecord::default();
        record.fields.insert(
            "brand".to_string(),
            snapattr_core::FieldValue::Scalar(serde_json::json!("Nike")),
        );
        record
            .confidences
            .insert("brand".to_string(), brand_confidence);
        record
    }

    #[test]
    fn attributes_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let id = store
            .store_attributes("item_1", &record(0.9), &serde_json::json!({}))
            .unwrap();
        assert!(id.starts_with("item_1/attributes/"));

        let restored = store.latest_attributes("item_1").unwrap().unwrap();
        assert_eq!(restored.confidences["brand"], 0.9);
    }

    #[test]
    fn latest_returns_most_recent_record() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .store_attributes("item_1", &record(0.2), &serde_json::json!({}))
            .unwrap();
        store
            .store_attributes("item_1", &record(0.8), &serde_json::json!({}))
            .unwrap();

        let restored = store.latest_attributes("item_1").unwrap().unwrap();
        assert_eq!(restored.confidences["brand"], 0.8);
    }

    #[test]
    fn missing_item_yields_none() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).latest_attributes("item_x").unwrap().is_none());
    }

    #[test]
    fn list_items_reports_stream_presence() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .store_attributes("item_a", &record(0.9), &serde_json::json!({}))
            .unwrap();
        store
            .store_lineage("item_a", &serde_json::json!({"step": "parse"}), &serde_json::json!({}))
            .unwrap();
        store
            .store_lineage("item_b", &serde_json::json!({}), &serde_json::json!({}))
            .unwrap();

        let items = store.list_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, "item_a");
        assert!(items[0].has_attributes);
        assert!(!items[0].has_raw_response);
        assert!(items[0].has_lineage);
        assert_eq!(items[0].record_count, 2);
        assert!(!items[1].has_attributes);
    }

    #[test]
    fn invalid_item_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir)
            .store_lineage("../escape", &serde_json::json!({}), &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidItemId(_)));
    }
}
