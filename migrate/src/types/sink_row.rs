use std::collections::BTreeMap;

/// A normalized value ready to be bound into the upsert statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkValue {
    Null,
    Integer(i64),
    Text(String),
    TextArray(Vec<String>),
    Boolean(bool),
}

impl SinkValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SinkValue::Null)
    }
}

/// A row destined for the sink table, keyed by a non-empty identifier.
///
/// `values` holds one entry per configured column, [`SinkValue::Null`] when the source had nothing
/// usable for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRow {
    pub id: String,
    pub values: BTreeMap<String, SinkValue>,
}

impl SinkRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, column: impl Into<String>, value: SinkValue) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn value(&self, column: &str) -> &SinkValue {
        self.values.get(column).unwrap_or(&SinkValue::Null)
    }

    /// Overlays `other` onto this row: each non-null value of `other` replaces the current one.
    pub fn merge_from(&mut self, other: SinkRow) {
        for (column, value) in other.values {
            if !value.is_null() {
                self.values.insert(column, value);
            } else {
                self.values.entry(column).or_insert(SinkValue::Null);
            }
        }
    }
}
