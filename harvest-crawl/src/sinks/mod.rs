//! Built-in storage sinks

pub mod db;
pub mod file;
pub mod memory;

pub use db::DbSink;
pub use file::JsonlFileSink;
pub use memory::MemorySink;
