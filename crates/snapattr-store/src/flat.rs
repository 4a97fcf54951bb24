//! Single-file parquet backend.
//!
//! All records live in one parquet file with five Utf8 columns:
//! `item_id`, `record_kind`, `timestamp`, `data`, `metadata`. Appending
//! reads the whole file, adds the row, and rewrites it; the volumes this
//! tool handles stay far below where that matters.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value;
use tracing::debug;

use snapattr_core::StorageConfig;

use crate::{ItemSummary, RecordKind, Store, StoreError, now_rfc3339, storage_id, validate_item_id};

struct Row {
    item_id: String,
    record_kind: String,
    timestamp: String,
    data: String,
    metadata: String,
}

#[derive(Debug)]
pub struct FlatStore {
    file_path: PathBuf,
}

impl FlatStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StoreError> {
        if config.create_dirs {
            if let Some(parent) = config.file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            file_path: config.file_path.clone(),
        })
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("item_id", DataType::Utf8, false),
            Field::new("record_kind", DataType::Utf8, false),
            Field::new("timestamp", DataType::Utf8, false),
            Field::new("data", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
        ]))
    }

    fn read_rows(&self) -> Result<Vec<Row>, StoreError> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.file_path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch?;
            let column = |index: usize| -> Result<&StringArray, StoreError> {
                batch
                    .column(index)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!("column {index} is not a string column"))
                    })
            };
            let item_ids = column(0)?;
            let kinds = column(1)?;
            let timestamps = column(2)?;
            let data = column(3)?;
            let metadata = column(4)?;
            for i in 0..batch.num_rows() {
                rows.push(Row {
                    item_id: item_ids.value(i).to_string(),
                    record_kind: kinds.value(i).to_string(),
                    timestamp: timestamps.value(i).to_string(),
                    data: data.value(i).to_string(),
                    metadata: metadata.value(i).to_string(),
                });
            }
        }
        Ok(rows)
    }

    fn write_rows(&self, rows: &[Row]) -> Result<(), StoreError> {
        let schema = Self::schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|row| row.item_id.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|row| row.record_kind.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|row| row.timestamp.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|row| row.data.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|row| row.metadata.as_str()),
                )),
            ],
        )?;

        let file = File::create(&self.file_path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }
}

impl Store for FlatStore {
    fn store(
        &self,
        item_id: &str,
        kind: RecordKind,
        data: &Value,
        metadata: &Value,
    ) -> Result<String, StoreError> {
        validate_item_id(item_id)?;
        let timestamp = now_rfc3339();
        let id = storage_id(item_id, kind, &timestamp);

        let mut rows = self.read_rows()?;
        rows.push(Row {
            item_id: item_id.to_string(),
            record_kind: kind.as_str().to_string(),
            timestamp,
            data: serde_json::to_string(data)?,
            metadata: serde_json::to_string(metadata)?,
        });
        self.write_rows(&rows)?;

        debug!(item_id, kind = kind.as_str(), rows = rows.len(), "stored record");
        Ok(id)
    }

    fn latest(&self, item_id: &str, kind: RecordKind) -> Result<Option<Value>, StoreError> {
        validate_item_id(item_id)?;
        let rows = self.read_rows()?;
        // RFC 3339 UTC timestamps compare chronologically as strings.
        let latest = rows
            .iter()
            .filter(|row| row.item_id == item_id && row.record_kind == kind.as_str())
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp));
        match latest {
            Some(row) => Ok(Some(serde_json::from_str(&row.data)?)),
            None => Ok(None),
        }
    }

    fn list_items(&self) -> Result<Vec<ItemSummary>, StoreError> {
        let rows = self.read_rows()?;
        let mut summaries: Vec<ItemSummary> = Vec::new();
        for row in &rows {
            let summary = match summaries
                .iter_mut()
                .find(|summary| summary.item_id == row.item_id)
            {
                Some(existing) => existing,
                None => {
                    summaries.push(ItemSummary {
                        item_id: row.item_id.clone(),
                        has_attributes: false,
                        has_raw_response: false,
                        has_lineage: false,
                        record_count: 0,
                    });
                    summaries
                        .last_mut()
                        .ok_or_else(|| StoreError::Corrupt("summary push failed".to_string()))?
                }
            };
            summary.record_count += 1;
            match row.record_kind.as_str() {
                "attributes" => summary.has_attributes = true,
                "raw_responses" => summary.has_raw_response = true,
                "lineage" => summary.has_lineage = true,
                _ => {}
            }
        }
        summaries.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(summaries)
    }

    /// One pass over the file instead of one reread per item.
    fn latest_attributes_all(
        &self,
    ) -> Result<Vec<(String, snapattr_core::AttributeRecord)>, StoreError> {
        let rows = self.read_rows()?;
        let mut newest: Vec<&Row> = Vec::new();
        for row in rows
            .iter()
            .filter(|row| row.record_kind == RecordKind::Attributes.as_str())
        {
            match newest.iter_mut().find(|kept| kept.item_id == row.item_id) {
                Some(kept) if kept.timestamp < row.timestamp => *kept = row,
                Some(_) => {}
                None => newest.push(row),
            }
        }
        newest.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        newest
            .into_iter()
            .map(|row| Ok((row.item_id.clone(), serde_json::from_str(&row.data)?)))
            .collect()
    }
}
