//! Canonical document digests.
//!
//! Documents are serialized through a canonical formatter before hashing:
//! object keys sorted recursively, no incidental whitespace. Two documents
//! with identical content therefore hash identically whatever the field order
//! their storage layer returned.
//!
//! The algorithm is always a parameter. Secure exports record the algorithm
//! that was active when they were produced, and hashing with any other one
//! yields a silent mismatch rather than an error.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Digest as _;
use std::fmt;
use std::str::FromStr;

/// Digest algorithms a secure export may have been produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
    #[serde(rename = "BLAKE3")]
    Blake3,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Raw digest of a byte slice.
    pub fn hash(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => sha1::Sha1::digest(bytes).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(bytes).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(bytes).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(bytes).to_vec(),
            Self::Blake3 => blake3::hash(bytes).as_bytes().to_vec(),
        }
    }

    /// Base64 digest of a byte slice.
    pub fn hash_base64(self, bytes: &[u8]) -> String {
        STANDARD.encode(self.hash(bytes))
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Algorithm name not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown digest algorithm '{0}'")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for DigestAlgorithm {
    type Err = UnknownAlgorithm;

    /// Accepts `SHA-512`, `SHA512`, `sha512` and the like.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            "BLAKE3" => Ok(Self::Blake3),
            _ => Err(UnknownAlgorithm(value.to_string())),
        }
    }
}

/// Canonical byte form of a JSON document.
pub fn canonical_bytes(document: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    write_canonical(document, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::String(text) => write_string(text, out),
        // Scalars have a single compact serde_json rendering.
        scalar => out.extend_from_slice(scalar.to_string().as_bytes()),
    }
}

fn write_string(text: &str, out: &mut Vec<u8>) {
    // Display of a JSON string value escapes exactly like the serializer.
    out.extend_from_slice(Value::String(text.to_string()).to_string().as_bytes());
}

/// Base64 digest of the canonical form of `document`.
pub fn digest(document: &Value, algorithm: DigestAlgorithm) -> String {
    algorithm.hash_base64(&canonical_bytes(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    #[test]
    fn canonical_form_sorts_keys_recursively() {
        let doc = json!({"b": 1, "a": {"d": [true, null], "c": "x"}});
        assert_eq!(
            String::from_utf8(canonical_bytes(&doc)).unwrap(),
            r#"{"a":{"c":"x","d":[true,null]},"b":1}"#
        );
    }

    #[test]
    fn strings_are_escaped() {
        let doc = json!({"k": "line\n\"quoted\""});
        assert_eq!(
            String::from_utf8(canonical_bytes(&doc)).unwrap(),
            r#"{"k":"line\n\"quoted\""}"#
        );
    }

    #[test]
    fn algorithm_names_parse_leniently() {
        assert_eq!("SHA-512".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha512);
        assert_eq!("sha256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!("SHA_384".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha384);
        assert!("MD4".parse::<DigestAlgorithm>().is_err());
    }

    #[test]
    fn algorithm_changes_the_digest() {
        let doc = json!({"_id": "u1"});
        assert_ne!(
            digest(&doc, DigestAlgorithm::Sha256),
            digest(&doc, DigestAlgorithm::Sha512)
        );
    }

    #[test]
    fn sha256_matches_known_vector() {
        // sha256("{}") base64-encoded
        assert_eq!(
            digest(&json!({}), DigestAlgorithm::Sha256),
            "RBNvo1WzZ4oRRq0W9+hknpT7T8If536DEMBg9hyq/4o="
        );
    }

    fn key() -> impl Strategy<Value = String> {
        prop::collection::vec(0u8..26, 1..6)
            .prop_map(|chars| chars.into_iter().map(|c| char::from(b'a' + c)).collect())
    }

    proptest! {
        #[test]
        fn digest_ignores_key_order(entries in prop::collection::btree_map(key(), any::<i64>(), 1..12)) {
            let forward: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reversed: Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            let nested_forward = json!({"outer": Value::Object(forward.clone()), "x": 1});
            let nested_reversed = json!({"x": 1, "outer": Value::Object(reversed.clone())});

            prop_assert_eq!(
                digest(&Value::Object(forward), DigestAlgorithm::Sha512),
                digest(&Value::Object(reversed), DigestAlgorithm::Sha512)
            );
            prop_assert_eq!(
                digest(&nested_forward, DigestAlgorithm::Sha256),
                digest(&nested_reversed, DigestAlgorithm::Sha256)
            );
        }
    }
}
