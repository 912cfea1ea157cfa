//! Batch migration of schemaless documents into a relational table.
//!
//! Documents are read page by page from a [`source::DocumentSource`], mapped onto a
//! [`schema::TableSchema`] by [`transform::transform`] and upserted in per-batch transactions by
//! a pool of workers, each owning one [`sink::SinkConnection`]. The [`pipeline::Pipeline`] wires
//! the pieces together and reports a [`types::MigrationSummary`].
//!
//! ```rust,no_run
//! use migrate::checkpoint::memory::MemoryCheckpointStore;
//! use migrate::pipeline::Pipeline;
//! use migrate::sink::memory::MemorySinkConnector;
//! use migrate::source::memory::MemorySource;
//! # use migrate::schema::TableSchema;
//! # use migrate_config::shared::PipelineConfig;
//!
//! # async fn run(schema: TableSchema) -> migrate::error::MigrateResult<()> {
//! let mut pipeline = Pipeline::new(
//!     PipelineConfig::default(),
//!     schema,
//!     MemorySource::default(),
//!     MemorySinkConnector::new(),
//!     MemoryCheckpointStore::new(),
//! );
//! pipeline.start().await?;
//! let summary = pipeline.wait().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod concurrency;
pub mod conversions;
pub mod error;
mod macros;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod schema;
pub mod sink;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
pub mod workers;
