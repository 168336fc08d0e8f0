//! Canonical JSON serialization
//!
//! Object keys are emitted in sorted order at every depth so that two
//! logically identical messages produce the same bytes, and therefore the
//! same hash, regardless of how their fields were inserted.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic string form of a JSON value.
///
/// Arrays keep their order, objects are emitted with keys sorted
/// lexicographically, and scalars use their JSON literal encoding.
///
/// Output is byte-compatible with JavaScript `JSON.stringify` over sorted keys
/// only for string and integer scalars: floats keep serde_json's form (`1.0`,
/// not `1`) and keys sort by UTF-8 bytes rather than UTF-16 code units.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
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
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 of the input, lowercase hex (64 characters).
pub fn sha256_hex(input: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_ref());
    hex::encode(hasher.finalize())
}

/// Hash of the canonical form of a message object.
pub fn message_hash(message: &Value) -> String {
    sha256_hex(canonicalize(message))
}
