mod base;
mod checkpoint;
mod connection;
mod migrator;
mod pipeline;
mod retry;
mod schema;
mod sink;
mod source;

pub use base::*;
pub use checkpoint::*;
pub use connection::*;
pub use migrator::*;
pub use pipeline::*;
pub use retry::*;
pub use schema::*;
pub use sink::*;
pub use source::*;
