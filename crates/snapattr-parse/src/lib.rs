//! Parsing core: response text in, attribute record and decision out.
//!
//! The chain is pure and synchronous: extraction isolates a JSON string,
//! mapping walks the schema, normalization finalizes confidences and
//! tags, and the decision engine applies the threshold policy. No I/O,
//! no shared state; safe to call concurrently from any number of tasks.

pub mod decide;
pub mod extract;
pub mod map;
pub mod normalize;

use thiserror::Error;
use tracing::debug;

use snapattr_core::{AttributeRecord, FieldSchema, Provenance, VlmResponse};

pub use decide::decide;
pub use extract::{can_parse, extract_json};
pub use map::map_fields;
pub use normalize::normalize;

/// Parser identity recorded in provenance.
pub const PARSER_NAME: &str = "json";

/// Single parse-failure surface for the caller. Extraction and decode
/// failures are one category from the pipeline's point of view; parsing
/// errors are local to one item and never abort a batch.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no valid JSON found in response")]
    NoJsonFound,

    #[error("failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller precondition violation: the response's top-level JSON
    /// value must be an object.
    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("no schema-compatible field found in response")]
    NoFields,
}

/// Parses VLM responses into [`AttributeRecord`]s.
#[derive(Debug, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Cheap applicability check used by upstream dispatch.
    pub fn can_parse(&self, response: &VlmResponse) -> bool {
        extract::can_parse(&response.content)
    }

    /// Parse a raw response against a schema.
    ///
    /// Field-level shape mismatches degrade silently (see [`map`]); only
    /// a response with no JSON, undecodable JSON, a non-object root, or
    /// nothing matching the schema fails.
    pub fn parse(
        &self,
        response: &VlmResponse,
        schema: &FieldSchema,
    ) -> Result<AttributeRecord, ParseError> {
        let candidate = extract_json(&response.content).ok_or(ParseError::NoJsonFound)?;
        let value: serde_json::Value = serde_json::from_str(&candidate)?;
        let data = value.as_object().ok_or(ParseError::NotAnObject)?;

        let mapped = map_fields(data, schema);
        if mapped.fields.is_empty() && mapped.notes.is_empty() {
            return Err(ParseError::NoFields);
        }

        let normalized = normalize(mapped);
        debug!(
            fields = normalized.fields.len(),
            tags = ?normalized.tags,
            "parsed response"
        );

        Ok(AttributeRecord {
            fields: normalized.fields,
            confidences: normalized.confidences,
            tags: normalized.tags,
            notes: normalized.notes,
            provenance: Provenance {
                parser: PARSER_NAME.to_string(),
                provider: response.provider.clone(),
                model: response.model.clone(),
                timestamp: Some(response.timestamp),
                latency_ms: response.latency_ms,
            },
        })
    }
}
