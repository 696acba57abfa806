//! Harvest Crawl
//!
//! Crawl contracts and built-in implementations for the Harvest scheduler.
//! It includes:
//! - Handler trait and the registry that resolves a handler for a site
//! - Storage sink trait and the ordered sink set handed to handlers
//! - Built-in handlers: the generic page crawler used as category default
//! - Built-in sinks: database table, JSON-lines files and an in-memory collector

pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod sink;
pub mod sinks;

pub use error::{CrawlError, ResolveError, SinkError};
pub use handler::{CrawlHandler, CrawlStats};
pub use handlers::PageCrawler;
pub use registry::{HandlerRegistry, Resolution, ResolvedHandler};
pub use sink::{SinkSet, StorageSink};
pub use sinks::{DbSink, JsonlFileSink, MemorySink};

pub use harvest_core::domain::record::CrawlRecord;
pub use harvest_core::domain::site::{SiteCategory, SiteConfig};
