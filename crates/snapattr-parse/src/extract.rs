//! JSON extraction from free-form model output.
//!
//! Model responses range from pure JSON to JSON buried in prose, fenced
//! code blocks, or pseudo-JSON with comments. Extraction runs a fixed
//! priority list of pure strategies and returns the first candidate that
//! parses.

use serde_json::Value;

/// Extraction strategies in priority order. First success wins.
const STRATEGIES: &[fn(&str) -> Option<String>] = &[
    whole_text,
    fenced_blocks,
    first_brace_span,
    first_brace_span_cleaned,
    all_brace_spans_cleaned,
];

/// Extract one syntactically valid JSON string from arbitrary response
/// text. Returns `None` when no strategy yields parseable JSON.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|strategy| strategy(trimmed))
}

/// Cheap applicability pre-check: pure JSON or a parseable fenced block.
///
/// Side-effect-free and consistent with [`extract_json`]: anything
/// accepted here is also accepted there.
pub fn can_parse(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    parses(trimmed) || fenced_blocks(trimmed).is_some()
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<Value>(candidate).is_ok()
}

/// Strategy 1: the entire trimmed text is JSON.
fn whole_text(text: &str) -> Option<String> {
    parses(text).then(|| text.to_string())
}

/// Strategy 2: triple-backtick fenced code blocks, optionally tagged
/// `json`. Candidates are tried in order of appearance.
fn fenced_blocks(text: &str) -> Option<String> {
    let mut segments = text.split("```");
    // Even segments are outside fences; skip the leading one.
    segments.next()?;
    loop {
        let inside = segments.next()?;
        // The closing fence must exist for this to be a block.
        segments.next()?;

        let body = inside.strip_prefix("json").unwrap_or(inside).trim();
        if body.starts_with('{') && parses(body) {
            return Some(body.to_string());
        }
    }
}

/// Strategy 3: the first `{...}` span found by brace matching.
fn first_brace_span(text: &str) -> Option<String> {
    let span = brace_span(text, text.find('{')?)?;
    parses(&span).then_some(span)
}

/// Strategy 4: strategy 3's span with comments stripped and whitespace
/// collapsed.
fn first_brace_span_cleaned(text: &str) -> Option<String> {
    let span = brace_span(text, text.find('{')?)?;
    let cleaned = clean(&span);
    parses(&cleaned).then_some(cleaned)
}

/// Strategy 5: every `{...}` span in the text, cleaned, first parse wins.
fn all_brace_spans_cleaned(text: &str) -> Option<String> {
    for (start, _) in text.match_indices('{') {
        if let Some(span) = brace_span(text, start) {
            let cleaned = clean(&span);
            if parses(&cleaned) {
                return Some(cleaned);
            }
        }
    }
    None
}

/// The substring from the `{` at `start` to its matching `}`, tracked by
/// nesting depth. Returns `None` when the braces never balance.
fn brace_span(text: &str, start: usize) -> Option<String> {
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip `//`-line, `/* */`-block, and `#`-line comments, then collapse
/// runs of whitespace to single spaces.
fn clean(text: &str) -> String {
    let without_blocks = strip_block_comments(text);
    let without_lines: String = without_blocks
        .lines()
        .map(strip_line_comment)
        .collect::<Vec<_>>()
        .join("\n");
    without_lines.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("/*") {
        out.push_str(&rest[..open]);
        match rest[open + 2..].find("*/") {
            Some(close) => rest = &rest[open + 2 + close + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn strip_line_comment(line: &str) -> &str {
    let cut = match (line.find("//"), line.find('#')) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    match cut {
        Some(idx) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_json_is_returned_verbatim() {
        let text = r#"{"brand": {"value": "Nike", "confidence": 0.9}}"#;
        assert_eq!(extract_json(text).as_deref(), Some(text));
        assert!(can_parse(text));
    }

    #[test]
    fn leading_and_trailing_whitespace_is_trimmed() {
        let text = "  \n {\"brand\": \"Puma\"} \n ";
        assert_eq!(extract_json(text).as_deref(), Some("{\"brand\": \"Puma\"}"));
    }

    #[test]
    fn empty_and_whitespace_input_fail() {
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("   \n\t "), None);
        assert!(!can_parse(""));
        assert!(!can_parse("   "));
    }

    #[test]
    fn fenced_block_with_json_tag() {
        let text = "Here is the result:\n```json\n{\"brand\": \"Puma\"}\n```\nDone.";
        assert_eq!(extract_json(text).as_deref(), Some("{\"brand\": \"Puma\"}"));
        assert!(can_parse(text));
    }

    #[test]
    fn fenced_block_without_tag() {
        let text = "```\n{\"brand\": \"Puma\"}\n```";
        assert_eq!(extract_json(text).as_deref(), Some("{\"brand\": \"Puma\"}"));
    }

    #[test]
    fn second_fenced_block_wins_when_first_is_invalid() {
        let text = "```json\nnot json at all\n```\n```json\n{\"ok\": true}\n```";
        assert_eq!(extract_json(text).as_deref(), Some("{\"ok\": true}"));
    }

    #[test]
    fn json_embedded_in_prose() {
        let text = "The attributes are {\"brand\": \"Nike\"} as requested.";
        assert_eq!(extract_json(text).as_deref(), Some("{\"brand\": \"Nike\"}"));
        // Prose with embedded JSON is not a cheap-precheck case.
        assert!(!can_parse(text));
    }

    #[test]
    fn nested_braces_are_matched() {
        let text = "result: {\"a\": {\"b\": {\"c\": 1}}} trailing";
        assert_eq!(
            extract_json(text).as_deref(),
            Some("{\"a\": {\"b\": {\"c\": 1}}}")
        );
    }

    #[test]
    fn line_comments_are_stripped() {
        let text = "{\n  \"brand\": \"Nike\", // detected from logo\n  \"condition\": \"used\"\n}";
        let extracted = extract_json(text).unwrap();
        let value: Value = serde_json::from_str(&extracted).unwrap();
        assert_eq!(value["brand"], "Nike");
        assert_eq!(value["condition"], "used");
    }

    #[test]
    fn block_and_hash_comments_are_stripped() {
        let text = "{ /* model guess */ \"brand\": \"Nike\" # trailing\n}";
        let extracted = extract_json(text).unwrap();
        let value: Value = serde_json::from_str(&extracted).unwrap();
        assert_eq!(value["brand"], "Nike");
    }

    #[test]
    fn later_span_wins_when_first_is_unparseable() {
        let text = "{broken and never valid} but then {\"brand\": \"Asics\"}";
        let extracted = extract_json(text).unwrap();
        let value: Value = serde_json::from_str(&extracted).unwrap();
        assert_eq!(value["brand"], "Asics");
    }

    #[test]
    fn no_json_anywhere_fails() {
        assert_eq!(extract_json("no json here"), None);
        assert!(!can_parse("no json here"));
    }

    #[test]
    fn unbalanced_braces_fail() {
        assert_eq!(extract_json("{\"brand\": \"Nike\""), None);
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "```json\n{\"brand\": \"Puma\"}\n```";
        assert_eq!(extract_json(text), extract_json(text));
    }
}
