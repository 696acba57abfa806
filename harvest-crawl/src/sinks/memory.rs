//! In-memory sink
//!
//! Collects records in a vector. Used for dry runs and tests.

use async_trait::async_trait;
use harvest_core::domain::record::CrawlRecord;
use std::sync::{Mutex, PoisonError};

use crate::error::SinkError;
use crate::sink::StorageSink;

pub struct MemorySink {
    name: String,
    records: Mutex<Vec<CrawlRecord>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Copy of every record written so far
    pub fn records(&self) -> Vec<CrawlRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, record: &CrawlRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
