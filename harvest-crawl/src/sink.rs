//! Storage sink contract
//!
//! Handlers write every extracted record through a `SinkSet`, an ordered
//! list of sinks shared read-only between all running jobs. Sinks must
//! tolerate concurrent writers themselves.

use async_trait::async_trait;
use harvest_core::domain::record::CrawlRecord;
use std::sync::Arc;

use crate::error::SinkError;

/// Trait for storage sinks
///
/// Implement this trait to persist crawled records somewhere.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Write a single record
    async fn write(&self, record: &CrawlRecord) -> Result<(), SinkError>;
}

/// Ordered set of storage sinks
#[derive(Clone, Default)]
pub struct SinkSet {
    sinks: Vec<Arc<dyn StorageSink>>,
}

impl SinkSet {
    pub fn new(sinks: Vec<Arc<dyn StorageSink>>) -> Self {
        Self { sinks }
    }

    /// Writes a record to every sink in order, stopping at the first failure
    pub async fn write(&self, record: &CrawlRecord) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.write(record).await?;
            tracing::debug!("Wrote record {} to sink {}", record.id, sink.name());
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
