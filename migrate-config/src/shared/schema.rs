use std::collections::HashSet;

use serde::Deserialize;

use crate::shared::ValidationError;

/// Target table and the mapping of each of its columns from source fields.
#[derive(Clone, Debug, Deserialize)]
pub struct TableConfig {
    /// Postgres schema of the target table, `public` when absent.
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// Column holding the conflict key of the upsert.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Source fields holding the identifier. Empty means the record key is the identifier.
    #[serde(default)]
    pub id_aliases: Vec<String>,
    /// Type of the identifier column when it is not `text`.
    #[serde(default)]
    pub id_cast: Option<IdCast>,
    pub columns: Vec<ColumnConfig>,
}

fn default_id_column() -> String {
    "id".to_string()
}

/// A sink column and where its value comes from.
#[derive(Clone, Debug, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    pub kind: ColumnKindConfig,
    /// Source field names tried in order, the first populated one wins.
    pub aliases: Vec<String>,
    /// Only read for `integer` columns.
    #[serde(default)]
    pub unit: IntegerUnit,
    /// Only read for `text_array` columns: split scalar strings on `,`, `，` and `、`.
    #[serde(default)]
    pub split_delimited: bool,
    #[serde(default)]
    pub merge: MergePolicy,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKindConfig {
    Integer,
    Text,
    TextArray,
    /// Boolean that is true when any alias holds a populated value.
    AnyPresent,
}

/// Non-text identifier column types.
///
/// Identifiers are bound as text and cast in the statement, so only types with a text input
/// function that is safe for any identifier string are offered.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdCast {
    Uuid,
    Integer,
    Bigint,
}

impl IdCast {
    pub fn sql_type(&self) -> &'static str {
        match self {
            IdCast::Uuid => "uuid",
            IdCast::Integer => "integer",
            IdCast::Bigint => "bigint",
        }
    }
}

/// Unit in which the source states the values of an integer column.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntegerUnit {
    #[default]
    One,
    Thousands,
    Millions,
}

impl IntegerUnit {
    pub fn multiplier(&self) -> i64 {
        match self {
            IntegerUnit::One => 1,
            IntegerUnit::Thousands => 1_000,
            IntegerUnit::Millions => 1_000_000,
        }
    }
}

/// How an incoming value is merged into an existing row on conflict.
///
/// Neither policy ever replaces a stored value with null.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// `COALESCE(incoming, existing)`.
    #[default]
    OverwriteNonNull,
    /// `COALESCE(existing, incoming)`.
    FillMissing,
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier("schema.table".to_string()));
        }

        if self.id_column.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier(
                "schema.id_column".to_string(),
            ));
        }

        if self.columns.is_empty() {
            return Err(ValidationError::NoColumns);
        }

        let mut seen = HashSet::with_capacity(self.columns.len() + 1);
        seen.insert(self.id_column.as_str());

        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(ValidationError::EmptyIdentifier(
                    "schema.columns.name".to_string(),
                ));
            }

            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.name.clone()));
            }

            if column.aliases.is_empty() {
                return Err(ValidationError::MissingAliases(column.name.clone()));
            }
        }

        Ok(())
    }
}
