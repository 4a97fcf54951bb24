//! Storage layer: per-item JSON trees (files) or a single parquet file (flat).
//!
//! Every record is stored as an envelope `{item_id, storage_id,
//! timestamp, data, metadata}`; the [`Store`] trait's typed helpers wrap
//! the generic envelope operations.

mod error;
mod files;
mod flat;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use snapattr_core::{AttributeRecord, StorageConfig, VlmResponse};

pub use error::StoreError;
pub use files::FileStore;
pub use flat::FlatStore;

/// The three record streams kept per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Attributes,
    RawResponse,
    Lineage,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Attributes => "attributes",
            RecordKind::RawResponse => "raw_responses",
            RecordKind::Lineage => "lineage",
        }
    }
}

/// Per-item inventory returned by [`Store::list_items`].
#[derive(Debug, Clone)]
pub struct ItemSummary {
    pub item_id: String,
    pub has_attributes: bool,
    pub has_raw_response: bool,
    pub has_lineage: bool,
    pub record_count: usize,
}

/// Append-only persistence for extraction outputs.
///
/// Implementations never overwrite: each store call adds a new record
/// and `latest` reads back the most recent one per kind.
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Append one record, returning its storage identifier.
    fn store(
        &self,
        item_id: &str,
        kind: RecordKind,
        data: &Value,
        metadata: &Value,
    ) -> Result<String, StoreError>;

    /// Most recent record of `kind` for an item, if any.
    fn latest(&self, item_id: &str, kind: RecordKind) -> Result<Option<Value>, StoreError>;

    /// All items present in the store, in item-id order.
    fn list_items(&self) -> Result<Vec<ItemSummary>, StoreError>;

    fn store_attributes(
        &self,
        item_id: &str,
        record: &AttributeRecord,
        metadata: &Value,
    ) -> Result<String, StoreError> {
        let data = serde_json::to_value(record)?;
        self.store(item_id, RecordKind::Attributes, &data, metadata)
    }

    fn store_raw_response(
        &self,
        item_id: &str,
        response: &VlmResponse,
        metadata: &Value,
    ) -> Result<String, StoreError> {
        let data = serde_json::to_value(response)?;
        self.store(item_id, RecordKind::RawResponse, &data, metadata)
    }

    fn store_lineage(
        &self,
        item_id: &str,
        lineage: &Value,
        metadata: &Value,
    ) -> Result<String, StoreError> {
        self.store(item_id, RecordKind::Lineage, lineage, metadata)
    }

    fn latest_attributes(&self, item_id: &str) -> Result<Option<AttributeRecord>, StoreError> {
        match self.latest(item_id, RecordKind::Attributes)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Newest attribute record for every item, in item-id order. Backends
    /// that pay per read should override this with a single scan.
    fn latest_attributes_all(&self) -> Result<Vec<(String, AttributeRecord)>, StoreError> {
        let mut records = Vec::new();
        for summary in self.list_items()? {
            if let Some(record) = self.latest_attributes(&summary.item_id)? {
                records.push((summary.item_id, record));
            }
        }
        Ok(records)
    }
}

/// Instantiate a storage backend by config name.
pub fn create_store(name: &str, config: &StorageConfig) -> Result<Box<dyn Store>, StoreError> {
    match name {
        "files" => Ok(Box::new(FileStore::new(config)?)),
        "flat" => Ok(Box::new(FlatStore::new(config)?)),
        other => Err(StoreError::UnknownBackend(other.to_string())),
    }
}

/// Item ids become path components and column values; reject separators
/// and empties up front.
fn validate_item_id(item_id: &str) -> Result<(), StoreError> {
    if item_id.is_empty()
        || item_id.contains('/')
        || item_id.contains('\\')
        || item_id.contains("..")
    {
        return Err(StoreError::InvalidItemId(item_id.to_string()));
    }
    Ok(())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn storage_id(item_id: &str, kind: RecordKind, timestamp: &str) -> String {
    format!("{item_id}/{}/{timestamp}", kind.as_str())
}

/// The stored envelope around one record.
fn envelope(item_id: &str, storage_id: &str, timestamp: &str, data: &Value, metadata: &Value) -> Value {
    serde_json::json!({
        "item_id": item_id,
        "storage_id": storage_id,
        "timestamp": timestamp,
        "data": data,
        "metadata": metadata,
    })
}
