pub mod base;
pub mod producer;
pub mod upsert;
