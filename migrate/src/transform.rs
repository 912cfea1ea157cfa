//! Mapping of raw source records onto sink rows.

use crate::conversions::array::to_text_array;
use crate::conversions::numeric::parse_scaled_integer;
use crate::conversions::presence::is_populated;
use crate::conversions::text::to_text;
use crate::schema::{ColumnKind, ColumnSchema, TableSchema};
use crate::types::{SinkRow, SinkValue, SourceRecord, SourceValue};

/// Transforms one record into a row of `schema`.
///
/// Returns `None` when the record has no usable identifier, in which case the caller counts it as
/// skipped. Every other problem only nulls the affected column. Performs no I/O.
pub fn transform(schema: &TableSchema, record: &SourceRecord) -> Option<SinkRow> {
    let id = record_id(schema, record)?;

    let mut row = SinkRow::new(id);
    for column in &schema.columns {
        row.values
            .insert(column.name.clone(), column_value(column, record));
    }

    Some(row)
}

/// Resolves the identifier: the record key, or the first populated identifier alias.
fn record_id(schema: &TableSchema, record: &SourceRecord) -> Option<String> {
    if schema.id_aliases.is_empty() {
        let key = record.key.trim();
        return (!key.is_empty()).then(|| key.to_string());
    }

    first_populated(record, &schema.id_aliases).and_then(to_text)
}

/// First alias holding a populated value. Later aliases are only fallbacks.
fn first_populated<'a>(record: &'a SourceRecord, aliases: &[String]) -> Option<&'a SourceValue> {
    aliases
        .iter()
        .filter_map(|alias| record.field(alias))
        .find(|value| is_populated(value))
}

fn column_value(column: &ColumnSchema, record: &SourceRecord) -> SinkValue {
    if let ColumnKind::AnyPresent = column.kind {
        return SinkValue::Boolean(first_populated(record, &column.aliases).is_some());
    }

    let Some(value) = first_populated(record, &column.aliases) else {
        return SinkValue::Null;
    };

    let converted = match column.kind {
        ColumnKind::Integer { unit } => parse_scaled_integer(value, unit).map(SinkValue::Integer),
        ColumnKind::Text => to_text(value).map(SinkValue::Text),
        ColumnKind::TextArray { split_delimited } => {
            to_text_array(value, split_delimited).map(SinkValue::TextArray)
        }
        ColumnKind::AnyPresent => None,
    };

    converted.unwrap_or(SinkValue::Null)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::IntegerUnit;

    fn schema() -> TableSchema {
        TableSchema::new(
            "companies",
            vec![
                ColumnSchema::new("name", ColumnKind::Text, &["name", "companyName"]),
                ColumnSchema::new(
                    "latest_revenue",
                    ColumnKind::Integer {
                        unit: IntegerUnit::Millions,
                    },
                    &["latestRevenue"],
                ),
                ColumnSchema::new(
                    "industry_tags",
                    ColumnKind::TextArray {
                        split_delimited: false,
                    },
                    &["industries"],
                ),
                ColumnSchema::new(
                    "has_web",
                    ColumnKind::AnyPresent,
                    &["companyUrl", "facebook"],
                ),
            ],
        )
    }

    fn record(document: serde_json::Value) -> SourceRecord {
        SourceRecord::from_json("company-1", document)
    }

    #[test]
    fn record_is_mapped_column_by_column() {
        let row = transform(
            &schema(),
            &record(json!({
                "name": " Acme ",
                "latestRevenue": "5",
                "industries": ["IT", "通信"],
                "facebook": "https://facebook.com/acme"
            })),
        )
        .unwrap();

        assert_eq!(row.id, "company-1");
        assert_eq!(row.value("name"), &SinkValue::Text("Acme".to_string()));
        assert_eq!(row.value("latest_revenue"), &SinkValue::Integer(5_000_000));
        assert_eq!(
            row.value("industry_tags"),
            &SinkValue::TextArray(vec!["IT".to_string(), "通信".to_string()])
        );
        assert_eq!(row.value("has_web"), &SinkValue::Boolean(true));
    }

    #[test]
    fn scalar_industry_becomes_single_element_array() {
        let row = transform(&schema(), &record(json!({"industries": "IT"}))).unwrap();

        assert_eq!(
            row.value("industry_tags"),
            &SinkValue::TextArray(vec!["IT".to_string()])
        );
    }

    #[test]
    fn first_populated_alias_wins() {
        let row = transform(
            &schema(),
            &record(json!({"name": "undefined", "companyName": "Fallback KK"})),
        )
        .unwrap();
        assert_eq!(row.value("name"), &SinkValue::Text("Fallback KK".to_string()));

        let row = transform(
            &schema(),
            &record(json!({"name": "Primary", "companyName": "Fallback KK"})),
        )
        .unwrap();
        assert_eq!(row.value("name"), &SinkValue::Text("Primary".to_string()));
    }

    #[test]
    fn absent_or_unparsable_values_become_null() {
        let row = transform(
            &schema(),
            &record(json!({"latestRevenue": "unknown", "industries": "[broken"})),
        )
        .unwrap();

        assert_eq!(row.value("name"), &SinkValue::Null);
        assert_eq!(row.value("latest_revenue"), &SinkValue::Null);
        assert_eq!(
            row.value("industry_tags"),
            &SinkValue::TextArray(vec!["[broken".to_string()])
        );
        assert_eq!(row.value("has_web"), &SinkValue::Boolean(false));
        assert_eq!(row.values.len(), 4);
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let schema = schema().with_id_aliases(&["corporateNumber"]);

        assert!(transform(&schema, &record(json!({"name": "Acme"}))).is_none());
        assert!(transform(&schema, &record(json!({"corporateNumber": "  "}))).is_none());

        let row = transform(&schema, &record(json!({"corporateNumber": 1234567890123i64}))).unwrap();
        assert_eq!(row.id, "1234567890123");
    }

    #[test]
    fn blank_record_key_is_rejected() {
        assert!(transform(&schema(), &SourceRecord::from_json(" ", json!({"name": "Acme"}))).is_none());
    }
}
