//! Target table description used by the transformer and the upsert executor.
//!
//! Built once from [`migrate_config::shared::TableConfig`] and shared by every worker.

mod table;

pub use migrate_config::shared::{IdCast, IntegerUnit, MergePolicy};
pub use table::*;
