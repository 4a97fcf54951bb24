//! Plain-text rendering of stored results and analysis outcomes.

use std::collections::BTreeMap;

use snapattr_core::{AttributeRecord, Decision, FieldValue};
use snapattr_store::Store;

use crate::pipeline::PipelineResult;

/// Print one analysis outcome.
pub fn print_result(result: &PipelineResult) {
    println!("=== {} ===", result.item_id);
    match (&result.attributes, &result.decision) {
        (Some(attributes), Some(decision)) => {
            print_record(attributes);
            print_decision(decision);
        }
        _ => {
            println!(
                "  failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!("  time: {:.1}ms", result.processing_time_ms);
    println!();
}

/// Summarize every item in the store.
pub fn print_store_summary(store: &dyn Store, limit: Option<usize>) -> anyhow::Result<()> {
    let mut items = store.list_items()?;
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    if items.is_empty() {
        println!("no stored items");
        return Ok(());
    }

    let attributes: BTreeMap<String, AttributeRecord> =
        store.latest_attributes_all()?.into_iter().collect();

    println!("{} item(s):", items.len());
    for summary in &items {
        println!(
            "  {}  records={}  attributes={}  raw={}  lineage={}",
            summary.item_id,
            summary.record_count,
            mark(summary.has_attributes),
            mark(summary.has_raw_response),
            mark(summary.has_lineage),
        );
        if let Some(record) = attributes.get(&summary.item_id) {
            print_record(record);
        }
    }
    Ok(())
}

fn print_record(record: &AttributeRecord) {
    for (name, value) in &record.fields {
        let confidence = record.confidences.get(name).copied().unwrap_or(0.0);
        match value {
            FieldValue::Scalar(scalar) => {
                println!("    {name}: {scalar} ({confidence:.2})");
            }
            FieldValue::Items(items) => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|item| format!("{} ({:.2})", item.name, item.confidence))
                    .collect();
                println!("    {name}: [{}] ({confidence:.2})", rendered.join(", "));
            }
        }
    }
    if !record.notes.is_empty() {
        println!("    notes: {}", record.notes);
    }
    let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
    println!("    tags: {}", tags.join(", "));
}

fn print_decision(decision: &Decision) {
    let verdict = if decision.accepted {
        "accepted"
    } else {
        "rejected"
    };
    println!(
        "  decision: {verdict} (confidence {:.3})",
        decision.confidence_score
    );
    for reason in &decision.reasons {
        println!("    - {reason}");
    }
}

fn mark(present: bool) -> &'static str {
    if present { "yes" } else { "no" }
}
