//! Threshold-based acceptance decisions.

use indexmap::IndexMap;
use snapattr_core::{AttributeRecord, Decision, FieldFlag, ThresholdPolicy};

use crate::normalize::aggregate_confidence;

/// Apply a threshold policy to a parsed record.
///
/// Pure and stateless: the same `(record, policy)` pair always produces
/// the same decision. Per-field flags are diagnostic only; overall
/// acceptance is gated solely by the aggregate confidence against the
/// policy's default threshold, so a record can be accepted while
/// individual fields are flagged `low_confidence`.
pub fn decide(record: &AttributeRecord, policy: &ThresholdPolicy) -> Decision {
    let mut field_flags = IndexMap::with_capacity(record.confidences.len());
    let mut reasons = Vec::new();

    for (field, &confidence) in &record.confidences {
        let threshold = policy.threshold_for(field);
        if confidence >= threshold {
            field_flags.insert(field.clone(), FieldFlag::Accepted);
        } else {
            field_flags.insert(field.clone(), FieldFlag::LowConfidence);
            reasons.push(format!(
                "{field} confidence {confidence:.3} below threshold {threshold:.3}"
            ));
        }
    }

    let confidence_score = aggregate_confidence(&record.confidences);
    let accepted = confidence_score >= policy.default_threshold();
    if !accepted {
        reasons.push(format!(
            "overall confidence {confidence_score:.3} below default threshold {:.3}",
            policy.default_threshold()
        ));
    }

    Decision {
        accepted,
        field_flags,
        reasons,
        confidence_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(confidences: &[(&str, f64)]) -> AttributeRecord {
        let mut record = AttributeRecord {
            fields: IndexMap::new(),
            confidences: IndexMap::new(),
            tags: Default::default(),
            notes: String::new(),
            provenance: Default::default(),
        };
        for &(name, confidence) in confidences {
            record.fields.insert(
                name.to_string(),
                snapattr_core::FieldValue::Scalar(serde_json::Value::Null),
            );
            record.confidences.insert(name.to_string(), confidence);
        }
        record
    }

    fn policy(entries: &[(&str, f64)]) -> ThresholdPolicy {
        ThresholdPolicy::new(
            entries
                .iter()
                .map(|&(name, value)| (name.to_string(), value))
                .collect::<BTreeMap<_, _>>(),
        )
        .unwrap()
    }

    #[test]
    fn low_fields_are_flagged_with_itemized_reasons() {
        let record = record(&[("brand", 0.3), ("model", 0.25)]);
        let policy = policy(&[("default", 0.75), ("brand", 0.80)]);

        let decision = decide(&record, &policy);
        assert!(!decision.accepted);
        assert_eq!(decision.field_flags["brand"], FieldFlag::LowConfidence);
        assert_eq!(decision.field_flags["model"], FieldFlag::LowConfidence);
        assert!((decision.confidence_score - 0.275).abs() < 1e-9);
        assert_eq!(decision.reasons.len(), 3);
        assert_eq!(
            decision.reasons[0],
            "brand confidence 0.300 below threshold 0.800"
        );
        assert_eq!(
            decision.reasons[1],
            "model confidence 0.250 below threshold 0.750"
        );
        assert_eq!(
            decision.reasons[2],
            "overall confidence 0.275 below default threshold 0.750"
        );
    }

    #[test]
    fn accepted_record_has_no_reasons() {
        let record = record(&[("brand", 0.9), ("condition", 0.85)]);
        let decision = decide(&record, &policy(&[("default", 0.75)]));
        assert!(decision.accepted);
        assert!(decision.reasons.is_empty());
        assert_eq!(decision.field_flags["brand"], FieldFlag::Accepted);
    }

    #[test]
    fn unlisted_fields_fall_back_to_default_threshold() {
        let record = record(&[("materials", 0.7)]);
        let policy = policy(&[("default", 0.6)]);
        let decision = decide(&record, &policy);
        assert_eq!(decision.field_flags["materials"], FieldFlag::Accepted);
    }

    #[test]
    fn flagged_field_does_not_veto_overall_acceptance() {
        // Deliberate policy: per-field flags are informational only.
        // brand misses its strict 0.95 bar, but the aggregate clears the
        // default threshold, so the record is accepted overall.
        let record = record(&[("brand", 0.80), ("condition", 0.90)]);
        let policy = policy(&[("default", 0.75), ("brand", 0.95)]);

        let decision = decide(&record, &policy);
        assert_eq!(decision.field_flags["brand"], FieldFlag::LowConfidence);
        assert!(decision.accepted);
        assert_eq!(decision.reasons.len(), 1);
    }

    #[test]
    fn empty_record_scores_zero_and_is_rejected() {
        let record = record(&[]);
        let decision = decide(&record, &policy(&[("default", 0.75)]));
        assert_eq!(decision.confidence_score, 0.0);
        assert!(!decision.accepted);
        assert_eq!(decision.reasons.len(), 1);
    }

    #[test]
    fn boundary_confidence_equal_to_threshold_is_accepted() {
        let record = record(&[("brand", 0.75)]);
        let decision = decide(&record, &policy(&[("default", 0.75)]));
        assert!(decision.accepted);
        assert_eq!(decision.field_flags["brand"], FieldFlag::Accepted);
    }

    #[test]
    fn decision_is_deterministic() {
        let record = record(&[("brand", 0.42), ("condition", 0.77)]);
        let policy = policy(&[("default", 0.75), ("brand", 0.80)]);
        let first = decide(&record, &policy);
        let second = decide(&record, &policy);
        assert_eq!(first.accepted, second.accepted);
        assert_eq!(first.reasons, second.reasons);
        assert_eq!(first.confidence_score, second.confidence_score);
        assert_eq!(first.field_flags, second.field_flags);
    }
}
