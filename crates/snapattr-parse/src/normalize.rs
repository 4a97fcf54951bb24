//! Confidence normalization and quality tagging.
//!
//! Model-reported confidences are never trusted verbatim: every value is
//! clamped into `[0.0, 1.0]`, list fields aggregate to the mean of their
//! clamped items, and exactly one quality tag is derived from the
//! aggregate.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use snapattr_core::FieldValue;

use crate::map::MappedFields;

pub const HIGH_CONFIDENCE_TAG: &str = "high_confidence";
pub const MEDIUM_CONFIDENCE_TAG: &str = "medium_confidence";
pub const LOW_CONFIDENCE_TAG: &str = "low_confidence";

const HIGH_CONFIDENCE_FLOOR: f64 = 0.8;
const MEDIUM_CONFIDENCE_FLOOR: f64 = 0.5;

/// Finalized field maps plus the derived quality tag set.
#[derive(Debug)]
pub struct Normalized {
    pub fields: IndexMap<String, FieldValue>,
    pub confidences: IndexMap<String, f64>,
    pub tags: BTreeSet<String>,
    pub notes: String,
}

/// Clamp a confidence into `[0.0, 1.0]`.
pub fn clamp_confidence(confidence: f64) -> f64 {
    confidence.clamp(0.0, 1.0)
}

/// Mean over all confidence-bearing fields; 0.0 when there are none.
pub fn aggregate_confidence(confidences: &IndexMap<String, f64>) -> f64 {
    if confidences.is_empty() {
        return 0.0;
    }
    confidences.values().sum::<f64>() / confidences.len() as f64
}

/// The single quality tag for an aggregate confidence.
pub fn quality_tag(aggregate: f64) -> &'static str {
    if aggregate > HIGH_CONFIDENCE_FLOOR {
        HIGH_CONFIDENCE_TAG
    } else if aggregate > MEDIUM_CONFIDENCE_FLOOR {
        MEDIUM_CONFIDENCE_TAG
    } else {
        LOW_CONFIDENCE_TAG
    }
}

/// Normalize raw mapper output into its final shape.
///
/// Clamps scalar confidences, clamps per-item confidences and derives
/// list-field means (empty list means 0.0), rebuilds the confidence map
/// in field order, and assigns the quality tag.
pub fn normalize(mapped: MappedFields) -> Normalized {
    let MappedFields {
        mut fields,
        confidences: raw_confidences,
        notes,
    } = mapped;

    let mut confidences = IndexMap::with_capacity(fields.len());
    for (name, value) in fields.iter_mut() {
        match value {
            FieldValue::Scalar(_) => {
                let raw = raw_confidences.get(name).copied().unwrap_or(0.0);
                confidences.insert(name.clone(), clamp_confidence(raw));
            }
            FieldValue::Items(items) => {
                for item in items.iter_mut() {
                    item.confidence = clamp_confidence(item.confidence);
                }
                let mean = if items.is_empty() {
                    0.0
                } else {
                    items.iter().map(|item| item.confidence).sum::<f64>() / items.len() as f64
                };
                confidences.insert(name.clone(), mean);
            }
        }
    }

    let aggregate = aggregate_confidence(&confidences);
    let tags = BTreeSet::from([quality_tag(aggregate).to_string()]);

    Normalized {
        fields,
        confidences,
        tags,
        notes,
    }
}
