//! Shared data types for the key-value store: the value tree clients store
//! and the write records the log codec persists.
//!
//! One `Value` representation backs the write-ahead log, the snapshot file,
//! and the HTTP JSON surface, so there is never a format mismatch between
//! "what was written" and "what is read back".

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A JSON-equivalent document value.
///
/// Objects use `IndexMap` rather than a plain `HashMap` so that key order
/// is preserved across a serialize/deserialize round trip, matching the
/// ordered-pairs contract `Record::Bulk` relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Returns a lowercase, whitespace-split token list if this value is a
    /// string; used by the inverted index. Non-string values index to
    /// nothing.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// A single durable unit of mutation. The all-or-nothing unit on recovery:
/// a log line either decodes into a whole `Record` or it doesn't.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
pub enum Record {
    Set { k: String, v: Value },
    Del { k: String },
    Bulk { data: Vec<(String, Value)> },
}

impl Record {
    /// Convenience constructor for a single-pair bulk write; used by tests
    /// and by `Engine::bulk_set`.
    pub fn bulk(items: Vec<(String, Value)>) -> Self {
        Record::Bulk { data: items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_record_round_trips_through_json() {
        let rec = Record::Set {
            k: "foo".to_string(),
            v: Value::String("bar".to_string()),
        };
        let line = serde_json::to_string(&rec).unwrap();
        let back: Record = serde_json::from_str(&line).unwrap();
        assert_eq!(rec, back);
    }

    #[test]
    fn bulk_record_preserves_pair_order() {
        let rec = Record::bulk(vec![
            ("a".to_string(), Value::Number(1.0)),
            ("b".to_string(), Value::Number(2.0)),
            ("c".to_string(), Value::Number(3.0)),
        ]);
        let line = serde_json::to_string(&rec).unwrap();
        let back: Record = serde_json::from_str(&line).unwrap();
        match back {
            Record::Bulk { data } => {
                let keys: Vec<&str> = data.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["a", "b", "c"]);
            }
            _ => panic!("expected Bulk"),
        }
    }

    #[test]
    fn object_values_preserve_key_order() {
        let mut map = IndexMap::new();
        map.insert("z".to_string(), Value::Number(1.0));
        map.insert("a".to_string(), Value::Number(2.0));
        let v = Value::Object(map);
        let line = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&line).unwrap();
        if let Value::Object(m) = back {
            let keys: Vec<&str> = m.keys().map(|k| k.as_str()).collect();
            assert_eq!(keys, vec!["z", "a"]);
        } else {
            panic!("expected Object");
        }
    }
}
