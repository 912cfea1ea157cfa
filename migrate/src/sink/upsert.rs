//! Construction of the bulk insert-or-merge statement.
//!
//! One statement inserts many rows with `ON CONFLICT (id) DO UPDATE`, where every column is merged
//! with `COALESCE` so an incoming null never overwrites a stored value.

use std::collections::HashMap;

use pg_escape::quote_identifier;

use crate::schema::{MergePolicy, TableSchema};
use crate::types::{SinkRow, SinkValue};

/// Maximum number of bind parameters in a single Postgres statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Alias of the target table inside the statement.
const TARGET_ALIAS: &str = "t";

/// Number of bind parameters used by one row.
pub fn params_per_row(schema: &TableSchema) -> usize {
    schema.columns.len() + 1
}

/// Largest number of rows that fit into one statement.
pub fn max_rows_per_statement(schema: &TableSchema) -> usize {
    (MAX_BIND_PARAMETERS / params_per_row(schema)).max(1)
}

/// Builds the upsert statement for `row_count` rows of `schema`.
///
/// Parameters are numbered row by row, the identifier first and then the columns in schema order.
/// Every placeholder carries an explicit cast so that nulls are typed.
pub fn build_upsert_sql(schema: &TableSchema, row_count: usize) -> String {
    let id_column = quote_identifier(&schema.id_column);

    let mut column_list = Vec::with_capacity(params_per_row(schema));
    column_list.push(id_column.to_string());
    for column in &schema.columns {
        column_list.push(quote_identifier(&column.name).to_string());
    }

    let id_placeholder_cast = match &schema.id_cast {
        Some(cast) => format!("::text::{}", cast.sql_type()),
        None => "::text".to_string(),
    };

    let per_row = params_per_row(schema);
    let mut values = Vec::with_capacity(row_count);
    for row_index in 0..row_count {
        let base = row_index * per_row;

        let mut placeholders = Vec::with_capacity(per_row);
        placeholders.push(format!("${}{}", base + 1, id_placeholder_cast));
        for (column_index, column) in schema.columns.iter().enumerate() {
            placeholders.push(format!(
                "${}::{}",
                base + column_index + 2,
                column.kind.sql_type()
            ));
        }

        values.push(format!("({})", placeholders.join(", ")));
    }

    let assignments: Vec<String> = schema
        .columns
        .iter()
        .map(|column| {
            let name = quote_identifier(&column.name);
            let (first, second) = match column.merge {
                MergePolicy::OverwriteNonNull => (
                    format!("EXCLUDED.{name}"),
                    format!("{TARGET_ALIAS}.{name}"),
                ),
                MergePolicy::FillMissing => (
                    format!("{TARGET_ALIAS}.{name}"),
                    format!("EXCLUDED.{name}"),
                ),
            };
            format!("{name} = COALESCE({first}, {second})")
        })
        .collect();

    format!(
        "INSERT INTO {}.{} AS {TARGET_ALIAS} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
        quote_identifier(&schema.schema),
        quote_identifier(&schema.table),
        column_list.join(", "),
        values.join(", "),
        id_column,
        assignments.join(", ")
    )
}

/// Values of `row` in bind order, matching [`build_upsert_sql`].
pub fn row_values<'a>(schema: &TableSchema, row: &'a SinkRow) -> Vec<&'a SinkValue> {
    schema
        .columns
        .iter()
        .map(|column| row.value(&column.name))
        .collect()
}

/// Folds rows sharing an identifier into one, since a single `ON CONFLICT` statement cannot touch
/// the same row twice.
///
/// Later non-null values win. Returns the folded rows in first-seen order and the number of rows
/// that were merged away.
pub fn fold_duplicate_ids(rows: Vec<SinkRow>) -> (Vec<SinkRow>, u64) {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut folded: Vec<SinkRow> = Vec::with_capacity(rows.len());
    let mut merged = 0;

    for row in rows {
        match positions.get(&row.id) {
            Some(&position) => {
                folded[position].merge_from(row);
                merged += 1;
            }
            None => {
                positions.insert(row.id.clone(), folded.len());
                folded.push(row);
            }
        }
    }

    (folded, merged)
}
