use serde_json::json;

use crate::types::SourceRecord;

/// A company document identified by `companyId`.
pub fn company_record(key: &str, company_id: &str, name: &str) -> SourceRecord {
    SourceRecord::from_json(key, json!({ "companyId": company_id, "name": name }))
}

/// A document none of the identifier aliases resolve for.
pub fn record_without_id(key: &str) -> SourceRecord {
    SourceRecord::from_json(key, json!({ "name": "Nameless", "revenue": "12百万円" }))
}

/// `count` company documents keyed `doc-00000`, `doc-00001`, ... with identifiers `C00000`, ...
pub fn numbered_records(count: usize) -> Vec<SourceRecord> {
    (0..count)
        .map(|i| {
            SourceRecord::from_json(
                format!("doc-{i:05}"),
                json!({
                    "companyId": format!("C{i:05}"),
                    "name": format!("Company {i}"),
                    "revenue": format!("{},000千円", i + 1),
                }),
            )
        })
        .collect()
}
