//! Shared data model for the snapattr pipeline.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An item of one or more product photos to analyze together.
#[derive(Debug, Clone)]
pub struct Item {
    pub item_id: String,
    pub images: Vec<ImageSource>,
    pub meta: BTreeMap<String, serde_json::Value>,
}

/// Image payload: processed bytes, or a remote URL passed through untouched.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Url(String),
}

/// One part of a multimodal chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
}

/// A chat message in provider wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// Request to a VLM provider.
#[derive(Debug, Clone, Serialize)]
pub struct VlmRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Token and cost accounting for one model call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

/// Immutable capture of one model call.
///
/// The parsing core only reads `content`; the identity fields are carried
/// into [`Provenance`] for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlmResponse {
    pub content: String,
    pub usage: Usage,
    pub latency_ms: f64,
    pub provider: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

/// One named entry of a list field, with its own confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub name: String,
    pub confidence: f64,
}

/// Value of one attribute field.
///
/// Persisted externally tagged (`{"items": [...]}` / `{"scalar": ...}`)
/// so the variant always survives a round trip: a scalar whose value
/// happens to be a JSON array can never be read back as a list field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Items(Vec<ListItem>),
    Scalar(serde_json::Value),
}

/// Audit metadata attached to a parsed record. Never used in decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    pub parser: String,
    pub provider: String,
    pub model: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub latency_ms: f64,
}

/// Parsed, canonical attributes extracted from one response.
///
/// Every field in `confidences` is normalized to `[0.0, 1.0]`, and
/// `fields` and `confidences` carry the same keys (freeform text lives in
/// `notes` and has no confidence entry). Created once per successful
/// parse and immutable thereafter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub fields: IndexMap<String, FieldValue>,
    pub confidences: IndexMap<String, f64>,
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub provenance: Provenance,
}

/// Per-field verdict inside a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFlag {
    Accepted,
    LowConfidence,
}

impl FieldFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::LowConfidence => "low_confidence",
        }
    }
}

/// Accept/reject verdict for one [`AttributeRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub accepted: bool,
    pub field_flags: IndexMap<String, FieldFlag>,
    pub reasons: Vec<String>,
    pub confidence_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_scalar_json_roundtrip() {
        let value = FieldValue::Scalar(serde_json::json!("Nike"));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"scalar":"Nike"}"#);
        let parsed: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn scalar_array_value_keeps_its_variant_through_serde() {
        // A scalar envelope may carry any JSON value, arrays included;
        // the tag keeps it from coming back as a list field.
        let scalar = FieldValue::Scalar(serde_json::json!([]));
        let parsed: FieldValue =
            serde_json::from_str(&serde_json::to_string(&scalar).unwrap()).unwrap();
        assert_eq!(parsed, scalar);

        let empty_list = FieldValue::Items(vec![]);
        let parsed: FieldValue =
            serde_json::from_str(&serde_json::to_string(&empty_list).unwrap()).unwrap();
        assert_eq!(parsed, empty_list);
    }

    #[test]
    fn field_value_items_json_roundtrip() {
        let value = FieldValue::Items(vec![
            ListItem {
                name: "white".into(),
                confidence: 0.9,
            },
            ListItem {
                name: "black".into(),
                confidence: 0.8,
            },
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let parsed: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn attribute_record_json_roundtrip() {
        let mut fields = IndexMap::new();
        fields.insert("brand".to_string(), FieldValue::Scalar("Nike".into()));
        fields.insert(
            "primary_colors".to_string(),
            FieldValue::Items(vec![ListItem {
                name: "white".into(),
                confidence: 0.9,
            }]),
        );
        let mut confidences = IndexMap::new();
        confidences.insert("brand".to_string(), 0.9);
        confidences.insert("primary_colors".to_string(), 0.9);
        let record = AttributeRecord {
            fields,
            confidences,
            tags: BTreeSet::from(["high_confidence".to_string()]),
            notes: "clean uppers".into(),
            provenance: Provenance {
                parser: "json".into(),
                provider: "mistral".into(),
                model: "pixtral-12b-latest".into(),
                timestamp: None,
                latency_ms: 812.5,
            },
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: AttributeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.fields, record.fields);
        assert_eq!(parsed.confidences, record.confidences);
        assert_eq!(parsed.tags, record.tags);
        assert_eq!(parsed.notes, record.notes);
    }

    #[test]
    fn decision_serializes_snake_case_flags() {
        let mut field_flags = IndexMap::new();
        field_flags.insert("brand".to_string(), FieldFlag::LowConfidence);
        let decision = Decision {
            accepted: false,
            field_flags,
            reasons: vec!["brand confidence 0.300 below threshold 0.800".into()],
            confidence_score: 0.3,
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["field_flags"]["brand"], "low_confidence");
    }
}
