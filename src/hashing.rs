//! Hashing System - SHA-256 Layout Fingerprints
//!
//! Identical requests and configs must produce identical fingerprints.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::compose::Page;
use crate::geometry::PageGeometry;
use crate::print::PrintConfig;

/// Lowercase hex SHA-256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compact JSON with object keys in byte order at every depth
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&canonicalize(serde_json::to_value(value)?))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[derive(Serialize)]
struct LayoutFingerprint<'a> {
    config: &'a PrintConfig,
    geometry: &'a PageGeometry,
    pages: Vec<PageFingerprint<'a>>,
}

#[derive(Serialize)]
struct PageFingerprint<'a> {
    page: &'a Page,
    images: Vec<String>,
}

/// Fingerprint of a finished layout: config, geometry, every placement and
/// the content digest of every placed raster.
pub fn compute_layout_hash(
    config: &PrintConfig,
    geometry: &PageGeometry,
    pages: &[Page],
) -> Result<String, serde_json::Error> {
    let fingerprint = LayoutFingerprint {
        config,
        geometry,
        pages: pages
            .iter()
            .map(|page| PageFingerprint {
                page,
                images: page.placements.iter().map(|p| p.image.digest()).collect(),
            })
            .collect(),
    };
    let canonical = canonical_json(&fingerprint)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Fingerprint of a request before it is built
pub fn compute_request_hash(
    card_ids: &impl Serialize,
    config: &PrintConfig,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_request = canonical_json(card_ids)?;
    let canonical_config = canonical_json(config)?;
    let combined = format!("{}:{}:{}", canonical_request, canonical_config, engine_version);
    Ok(sha256_hex(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_canonical_json_sorts_nested_objects() {
        let obj = json!({"pages": [{"y": 1, "x": {"b": true, "a": null}}], "config": {}});
        assert_eq!(
            canonical_json(&obj).unwrap(),
            r#"{"config":{},"pages":[{"x":{"a":null,"b":true},"y":1}]}"#
        );
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_request_hash_depends_on_config() {
        let ids = vec!["a", "b"];
        let config = PrintConfig::default();
        let h1 = compute_request_hash(&ids, &config, "1.0.0").unwrap();
        let h2 = compute_request_hash(&ids, &config, "1.0.0").unwrap();
        assert_eq!(h1, h2);

        let other = PrintConfig {
            print_back_side: true,
            ..Default::default()
        };
        let h3 = compute_request_hash(&ids, &other, "1.0.0").unwrap();
        assert_ne!(h1, h3);
    }
}
