//! Best-effort recovery of a JSON object from free-form model output.
//!
//! Models wrap JSON in prose and markdown fences. The primary strategy slices
//! from the first `{` to the last `}`; when that slice does not parse, the
//! first balanced object (string-literal aware) and then a relaxed JSON5 parse
//! are tried. Nothing here errors: a miss is `None` and callers decide whether
//! to retry.

use serde_json::Value;
use tracing::trace;

/// Extract one JSON object from `text`, or `None` when no object can be recovered.
pub fn extract_json(text: Option<&str>) -> Option<Value> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }

    let outer = outer_brace_slice(text);
    let candidate = outer.unwrap_or(text);
    if let Some(value) = parse_object(candidate) {
        return Some(value);
    }

    if let Some(balanced) = first_balanced_object(text) {
        if balanced.len() != candidate.len() {
            if let Some(value) = parse_object(balanced) {
                trace!("recovered JSON object via balanced scan");
                return Some(value);
            }
        }
    }

    let relaxed = json5::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object);
    if relaxed.is_some() {
        trace!("recovered JSON object via relaxed parse");
    }
    relaxed
}

/// Slice from the first `{` to the last `}` inclusive, if both exist in order.
fn outer_brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

/// Find the first `{...}` whose braces balance, ignoring braces inside string literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset;
                    return Some(&text[start..=end]);
                }
            }
            _ => {}
        }
    }
    None
}
