// extract.rs - Pull a numeric depth array out of model response text
//
// Vision models return near-JSON wrapped in markdown fences or prose.
// Extraction order: fence contents, else first '{' to last '}', then
// an ordered list of known field names, then a bare array.

use serde_json::Value;

use crate::error::{ReliefError, Result};

/// Field names tried in order. The reply is untrusted; adapter variants
/// in the wild have used all of these.
const FIELD_NAMES: &[&str] = &["depthMap", "depth", "data"];

/// Extract the raw (pre-normalization) depth array from response text.
pub(crate) fn depth_array(text: &str) -> Result<Vec<f64>> {
    let candidate = candidate_json(text)
        .ok_or_else(|| ReliefError::parse("no JSON object in response"))?;
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ReliefError::Parse(e.to_string()))?;
    let items = find_array(&value)
        .ok_or_else(|| ReliefError::parse("no depth array under any known field"))?;
    numbers(items)
}

/// Slice the most plausible JSON span out of the text.
fn candidate_json(text: &str) -> Option<&str> {
    if let Some(inner) = fenced(text) {
        return Some(inner);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

/// Contents of the first markdown code fence, language tag stripped.
/// An unterminated fence takes the remainder of the text.
fn fenced(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let inner = match rest.find("```") {
        Some(close) => &rest[..close],
        None => rest,
    };
    Some(inner.trim())
}

fn find_array(value: &Value) -> Option<&Vec<Value>> {
    if let Value::Array(items) = value {
        return Some(items);
    }
    let obj = value.as_object()?;
    FIELD_NAMES
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
}

fn numbers(items: &[Value]) -> Result<Vec<f64>> {
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| ReliefError::Parse(format!("non-numeric element: {v}")))
        })
        .collect()
}
