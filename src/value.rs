//! Loose-typed accessors over frontmatter values
//!
//! Capability configuration arrives as an untyped YAML document. Every
//! optional field is shape-checked through one of the accessors below:
//! a value of the wrong type yields `None`, and the caller falls back to
//! the field's default. Malformed input never aborts a compile.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// View over an optional YAML mapping with type-coercing field access.
///
/// Wraps the configuration block of a single capability kind (or the
/// whole `safe-outputs:` section). A missing or non-mapping block
/// behaves like an empty one: every accessor returns `None`.
#[derive(Debug, Clone, Copy)]
pub struct ConfigMap<'a> {
    map: Option<&'a Mapping>,
}

impl<'a> ConfigMap<'a> {
    pub fn new(value: &'a Value) -> Self {
        ConfigMap {
            map: value.as_mapping(),
        }
    }

    pub fn from_mapping(map: &'a Mapping) -> Self {
        ConfigMap { map: Some(map) }
    }

    pub fn empty() -> Self {
        ConfigMap { map: None }
    }

    /// Raw value lookup
    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.map?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Whether the key is present at all (regardless of its value)
    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// String field. Numbers and booleans are not coerced.
    pub fn str(&self, key: &str) -> Option<String> {
        self.value(key).and_then(Value::as_str).map(String::from)
    }

    /// Boolean field
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    /// Non-negative integer field
    pub fn uint(&self, key: &str) -> Option<u64> {
        self.value(key).and_then(Value::as_u64)
    }

    /// String-list field. A bare scalar string coerces to a
    /// single-element list; list entries of the wrong type are dropped.
    pub fn str_list(&self, key: &str) -> Option<Vec<String>> {
        match self.value(key)? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Sequence(seq) => Some(
                seq.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Nested mapping field
    pub fn section(&self, key: &str) -> ConfigMap<'a> {
        match self.value(key) {
            Some(v) => ConfigMap::new(v),
            None => ConfigMap::empty(),
        }
    }

    /// String→string map field. Entries with non-string keys or values
    /// are dropped.
    pub fn string_map(&self, key: &str) -> Option<BTreeMap<String, String>> {
        let m = self.value(key)?.as_mapping()?;
        Some(
            m.iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                .collect(),
        )
    }

    /// Iterate over (string key, value) entries, skipping non-string keys
    pub fn entries(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.map
            .into_iter()
            .flat_map(|m| m.iter())
            .filter_map(|(k, v)| Some((k.as_str()?, v)))
    }
}

/// Parse a `max` field with the per-kind fallback rule: wrong-typed or
/// out-of-range literals fall back to the kind's default silently.
/// `zero_ok` marks kinds whose documented default is 0 ("unlimited").
pub fn parse_max(cfg: &ConfigMap<'_>, default: u32, zero_ok: bool) -> u32 {
    match cfg.uint("max") {
        Some(0) if !zero_ok => default,
        Some(n) => u32::try_from(n).unwrap_or(default),
        None => default,
    }
}
