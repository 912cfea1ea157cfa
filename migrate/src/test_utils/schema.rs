use crate::schema::{ColumnKind, ColumnSchema, IntegerUnit, MergePolicy, TableSchema};

/// The `companies` table used across tests.
///
/// Rows are identified by `companyId`, falling back to `corporateNumber`. `founded_year` keeps the
/// first value ever written.
pub fn company_schema() -> TableSchema {
    TableSchema::new(
        "companies",
        vec![
            ColumnSchema::new("name", ColumnKind::Text, &["name", "companyName"]),
            ColumnSchema::new(
                "latest_revenue",
                ColumnKind::Integer {
                    unit: IntegerUnit::Thousands,
                },
                &["revenue", "latestRevenue"],
            ),
            ColumnSchema::new(
                "industries",
                ColumnKind::TextArray {
                    split_delimited: true,
                },
                &["industries", "industry"],
            ),
            ColumnSchema::new("has_website", ColumnKind::AnyPresent, &["website", "url"]),
            ColumnSchema::new(
                "founded_year",
                ColumnKind::Integer {
                    unit: IntegerUnit::One,
                },
                &["foundedYear"],
            )
            .with_merge(MergePolicy::FillMissing),
        ],
    )
    .with_id_aliases(&["companyId", "corporateNumber"])
}
