//! Ordered shard-key values.
//!
//! Zone and chunk boundaries are shard-key documents compared field by field
//! using the cluster's canonical type order:
//! `MinKey < null < numbers < strings < ObjectId < booleans < MaxKey`.
//! The variant order of [`KeyValue`] encodes that order, so the derived
//! `Ord` is the comparison the cluster uses.
//!
//! Boundaries are read and written as extended JSON
//! (`{ "$minKey": 1 }`, `{ "$oid": "..." }`, `{ "$numberLong": "..." }`)
//! and rendered for command plans in mongo-shell syntax.

use std::cmp::Ordering;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

use crate::error::{EqualizerError, Result};

/// One field value of a shard key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum KeyValue {
    MinKey,
    Null,
    Number(i64),
    String(String),
    ObjectId(String),
    Bool(bool),
    MaxKey,
}

impl TryFrom<Value> for KeyValue {
    type Error = EqualizerError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(KeyValue::Null),
            Value::Bool(b) => Ok(KeyValue::Bool(b)),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(KeyValue::Number)
                .ok_or_else(|| {
                    EqualizerError::invalid_argument(format!(
                        "unsupported shard key number {n}"
                    ))
                }),
            Value::String(s) => Ok(KeyValue::String(s)),
            Value::Object(map) => {
                if map.contains_key("$minKey") {
                    return Ok(KeyValue::MinKey);
                }
                if map.contains_key("$maxKey") {
                    return Ok(KeyValue::MaxKey);
                }
                if let Some(Value::String(oid)) = map.get("$oid") {
                    return Ok(KeyValue::ObjectId(oid.clone()));
                }
                if let Some(Value::String(long)) = map.get("$numberLong") {
                    return long.parse().map(KeyValue::Number).map_err(|_| {
                        EqualizerError::invalid_argument(format!("invalid $numberLong '{long}'"))
                    });
                }
                Err(EqualizerError::invalid_argument(format!(
                    "unsupported shard key value {}",
                    Value::Object(map)
                )))
            }
            Value::Array(_) => Err(EqualizerError::invalid_argument(
                "arrays are not valid shard key values",
            )),
        }
    }
}

impl From<KeyValue> for Value {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::MinKey => json!({ "$minKey": 1 }),
            KeyValue::Null => Value::Null,
            KeyValue::Number(n) => json!(n),
            KeyValue::String(s) => Value::String(s),
            KeyValue::ObjectId(oid) => json!({ "$oid": oid }),
            KeyValue::Bool(b) => Value::Bool(b),
            KeyValue::MaxKey => json!({ "$maxKey": 1 }),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::MinKey => f.write_str("MinKey"),
            KeyValue::Null => f.write_str("null"),
            KeyValue::Number(n) => write!(f, "{n}"),
            KeyValue::String(s) => write!(f, "{}", Value::String(s.clone())),
            KeyValue::ObjectId(oid) => write!(f, "ObjectId(\"{oid}\")"),
            KeyValue::Bool(b) => write!(f, "{b}"),
            KeyValue::MaxKey => f.write_str("MaxKey"),
        }
    }
}

/// A shard-key document: ordered `(field, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    fields: Vec<(String, KeyValue)>,
}

impl ShardKey {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, KeyValue)>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Single-field key, the common `{ _id: value }` shape.
    pub fn single(field: impl Into<String>, value: KeyValue) -> Self {
        Self::new([(field.into(), value)])
    }

    pub fn min_key(field: impl Into<String>) -> Self {
        Self::single(field, KeyValue::MinKey)
    }

    pub fn max_key(field: impl Into<String>) -> Self {
        Self::single(field, KeyValue::MaxKey)
    }

    pub fn fields(&self) -> &[(String, KeyValue)] {
        &self.fields
    }

    /// Parse an extended-JSON document such as `{ "_id": 42 }`.
    pub fn parse_json(text: &str) -> Result<Self> {
        let key: ShardKey = serde_json::from_str(text)?;
        if key.fields.is_empty() {
            return Err(EqualizerError::invalid_argument(format!(
                "empty shard key document '{text}'"
            )));
        }
        Ok(key)
    }
}

impl Ord for ShardKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let values = self.fields.iter().map(|(_, v)| v);
        let other_values = other.fields.iter().map(|(_, v)| v);
        values.cmp(other_values).then_with(|| {
            let names = self.fields.iter().map(|(k, _)| k);
            names.cmp(other.fields.iter().map(|(k, _)| k))
        })
    }
}

impl PartialOrd for ShardKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} : {}", Value::String(name.clone()), value)?;
        }
        f.write_str(" }")
    }
}

impl Serialize for ShardKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ShardKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ShardKeyVisitor;

        impl<'de> Visitor<'de> for ShardKeyVisitor {
            type Value = ShardKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a shard key document")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<ShardKey, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(1));
                while let Some((name, value)) = access.next_entry::<String, KeyValue>()? {
                    fields.push((name, value));
                }
                Ok(ShardKey { fields })
            }
        }

        deserializer.deserialize_map(ShardKeyVisitor)
    }
}
