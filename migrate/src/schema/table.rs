use migrate_config::shared::{
    ColumnConfig, ColumnKindConfig, IdCast, IntegerUnit, MergePolicy, TableConfig,
};

const DEFAULT_SCHEMA: &str = "public";

/// Kind of a sink column together with its kind specific options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer { unit: IntegerUnit },
    Text,
    TextArray { split_delimited: bool },
    AnyPresent,
}

impl ColumnKind {
    /// Postgres type the bound parameter is cast to.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer { .. } => "bigint",
            ColumnKind::Text => "text",
            ColumnKind::TextArray { .. } => "text[]",
            ColumnKind::AnyPresent => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    /// Source fields tried in order.
    pub aliases: Vec<String>,
    pub merge: MergePolicy,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnKind, aliases: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind,
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
            merge: MergePolicy::OverwriteNonNull,
        }
    }

    pub fn with_merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }
}

impl From<&ColumnConfig> for ColumnSchema {
    fn from(config: &ColumnConfig) -> Self {
        let kind = match config.kind {
            ColumnKindConfig::Integer => ColumnKind::Integer { unit: config.unit },
            ColumnKindConfig::Text => ColumnKind::Text,
            ColumnKindConfig::TextArray => ColumnKind::TextArray {
                split_delimited: config.split_delimited,
            },
            ColumnKindConfig::AnyPresent => ColumnKind::AnyPresent,
        };

        Self {
            name: config.name.clone(),
            kind,
            aliases: config.aliases.clone(),
            merge: config.merge,
        }
    }
}

/// The sink table rows are upserted into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub schema: String,
    pub table: String,
    pub id_column: String,
    /// Source fields holding the identifier. Empty means the record key is used.
    pub id_aliases: Vec<String>,
    pub id_cast: Option<IdCast>,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: table.into(),
            id_column: "id".to_string(),
            id_aliases: Vec::new(),
            id_cast: None,
            columns,
        }
    }

    pub fn with_id_aliases(mut self, aliases: &[&str]) -> Self {
        self.id_aliases = aliases.iter().map(|alias| alias.to_string()).collect();
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }
}

impl From<&TableConfig> for TableSchema {
    fn from(config: &TableConfig) -> Self {
        Self {
            schema: config
                .schema
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            table: config.table.clone(),
            id_column: config.id_column.clone(),
            id_aliases: config.id_aliases.clone(),
            id_cast: config.id_cast,
            columns: config.columns.iter().map(ColumnSchema::from).collect(),
        }
    }
}
