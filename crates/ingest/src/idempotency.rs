//! Deterministic idempotency keys
//!
//! A key is the SHA-256 of the canonical JSON encoding of
//! `{"body": .., "source": .., "tenant": ..}`. Canonical means object keys are
//! emitted in sorted order at every depth, with no insignificant whitespace,
//! so two bodies that differ only in key order hash identically.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Prefix marking keys derived by the server rather than chosen by a client
pub const DERIVED_KEY_PREFIX: &str = "auto-";

/// Fingerprints one logical operation
///
/// Returns 64 lowercase hex characters.
pub fn generate_key(tenant_id: &str, source: &str, body: &Value) -> String {
    let mut canonical = String::with_capacity(128);
    canonical.push_str("{\"body\":");
    write_canonical(body, &mut canonical);
    canonical.push_str(",\"source\":");
    write_string(source, &mut canonical);
    canonical.push_str(",\"tenant\":");
    write_string(tenant_id, &mut canonical);
    canonical.push('}');

    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// [`generate_key`] with [`DERIVED_KEY_PREFIX`] applied
pub fn derive_key(tenant_id: &str, source: &str, body: &Value) -> String {
    format!("{}{}", DERIVED_KEY_PREFIX, generate_key(tenant_id, source, body))
}

/// Serializes `value` with object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars have a single serde_json encoding
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_hex_sha256() {
        let key = generate_key("t1", "github", &json!({"a": 1}));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_key_ignores_insertion_order() {
        let a: Value = serde_json::from_str(r#"{"id": 7, "user": {"name": "x", "age": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"user": {"age": 3, "name": "x"}, "id": 7}"#).unwrap();

        assert_eq!(generate_key("t", "s", &a), generate_key("t", "s", &b));
    }

    #[test]
    fn test_key_depends_on_every_component() {
        let body = json!({"id": 1});
        let base = generate_key("t1", "stripe", &body);

        assert_ne!(base, generate_key("t2", "stripe", &body));
        assert_ne!(base, generate_key("t1", "github", &body));
        assert_ne!(base, generate_key("t1", "stripe", &json!({"id": 2})));
    }

    #[test]
    fn test_array_order_is_significant() {
        assert_ne!(
            generate_key("t", "s", &json!([1, 2])),
            generate_key("t", "s", &json!([2, 1]))
        );
    }

    #[test]
    fn test_components_cannot_be_spliced() {
        // Quoting keeps `"a\",\"b"` from colliding with two separate fields
        assert_ne!(
            generate_key("a\",\"source\":\"b", "c", &json!(null)),
            generate_key("a", "b", &json!(null))
        );
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": [{"z": 1, "y": 2}], "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a":"x","b":[{"y":2,"z":1}]}"#);
    }

    #[test]
    fn test_derived_key_prefix() {
        let key = derive_key("t", "s", &json!({}));
        assert!(key.starts_with(DERIVED_KEY_PREFIX));
        assert_eq!(key.len(), DERIVED_KEY_PREFIX.len() + 64);
    }
}
