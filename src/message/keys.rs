//! Extracted key pairs.
//!
//! On append, the store scans a message's payload and records every
//! `(attribute_name, string_value)` pair it exposes. `null` attributes are
//! skipped; non-string scalars are coerced to their string rendering;
//! nested objects/arrays are not descended into — only the payload's
//! top-level fields are indexable attributes.

use serde_json::Value;

/// One `(name, value)` pair extracted from a payload.
pub type KeyPair = (String, String);

pub fn extract_keys(payload: &Value) -> Vec<KeyPair> {
    let Value::Object(map) = payload else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(name, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            Some((name.clone(), rendered))
        })
        .collect()
}
