use std::collections::BTreeMap;

/// A dynamically typed value read from a source document.
///
/// Documents have no fixed shape, so every field is held as one of these variants and the
/// transformer pattern matches on them to produce typed sink values.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<SourceValue>),
    Map(BTreeMap<String, SourceValue>),
}

impl SourceValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SourceValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SourceValue::Null)
    }

    /// Converts the value back into JSON, used for the canonical text encoding of nested values.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SourceValue::Null => serde_json::Value::Null,
            SourceValue::Bool(value) => serde_json::Value::Bool(*value),
            SourceValue::Integer(value) => serde_json::Value::from(*value),
            // Non-finite floats have no JSON representation.
            SourceValue::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            SourceValue::String(value) => serde_json::Value::String(value.clone()),
            SourceValue::List(values) => {
                serde_json::Value::Array(values.iter().map(SourceValue::to_json).collect())
            }
            SourceValue::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for SourceValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SourceValue::Null,
            serde_json::Value::Bool(value) => SourceValue::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => SourceValue::Integer(value),
                None => number
                    .as_f64()
                    .map(SourceValue::Float)
                    .unwrap_or(SourceValue::Null),
            },
            serde_json::Value::String(value) => SourceValue::String(value),
            serde_json::Value::Array(values) => {
                SourceValue::List(values.into_iter().map(SourceValue::from).collect())
            }
            serde_json::Value::Object(entries) => SourceValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, SourceValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        SourceValue::String(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        SourceValue::String(value)
    }
}

impl From<i64> for SourceValue {
    fn from(value: i64) -> Self {
        SourceValue::Integer(value)
    }
}

impl From<bool> for SourceValue {
    fn from(value: bool) -> Self {
        SourceValue::Bool(value)
    }
}

/// One document read from the source: its sortable key and its fields.
///
/// The key doubles as the pagination cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub key: String,
    pub fields: BTreeMap<String, SourceValue>,
}

impl SourceRecord {
    pub fn new(key: impl Into<String>, fields: BTreeMap<String, SourceValue>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Builds a record from a JSON document. Anything other than an object yields no fields.
    pub fn from_json(key: impl Into<String>, document: serde_json::Value) -> Self {
        let fields = match SourceValue::from(document) {
            SourceValue::Map(entries) => entries,
            _ => BTreeMap::new(),
        };

        Self::new(key, fields)
    }

    pub fn field(&self, name: &str) -> Option<&SourceValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_documents_become_value_trees() {
        let record = SourceRecord::from_json(
            "doc-1",
            json!({
                "name": "Acme",
                "employees": 12,
                "ratio": 0.5,
                "industries": ["IT", null],
                "address": {"city": "Tokyo"}
            }),
        );

        assert_eq!(record.field("name"), Some(&SourceValue::from("Acme")));
        assert_eq!(record.field("employees"), Some(&SourceValue::Integer(12)));
        assert_eq!(record.field("ratio"), Some(&SourceValue::Float(0.5)));
        assert_eq!(
            record.field("industries"),
            Some(&SourceValue::List(vec![
                SourceValue::from("IT"),
                SourceValue::Null
            ]))
        );
        assert!(matches!(record.field("address"), Some(SourceValue::Map(_))));
    }

    #[test]
    fn non_object_documents_have_no_fields() {
        let record = SourceRecord::from_json("doc-2", json!(["not", "an", "object"]));

        assert_eq!(record.key, "doc-2");
        assert!(record.fields.is_empty());
    }

    #[test]
    fn large_unsigned_numbers_fall_back_to_floats() {
        let value = SourceValue::from(json!(u64::MAX));

        assert!(matches!(value, SourceValue::Float(_)));
    }
}
