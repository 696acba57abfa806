//! Scripted crawl handlers for dispatcher and engine tests

use async_trait::async_trait;
use harvest_core::domain::site::SiteConfig;
use harvest_crawl::{CrawlError, CrawlHandler, CrawlStats, SinkSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail(&'static str),
    Panic,
    /// Blocks until a permit is added to the handler's gate
    WaitForRelease,
}

/// Page limits seen by a handler, one entry per call
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<u32>>>);

impl Calls {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn page_limits(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }
}

pub struct ScriptedHandler {
    behavior: Behavior,
    calls: Calls,
    gate: Arc<Semaphore>,
}

impl ScriptedHandler {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Calls::default(),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn calls(&self) -> Calls {
        self.calls.clone()
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        Arc::clone(&self.gate)
    }
}

#[async_trait]
impl CrawlHandler for ScriptedHandler {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn crawl(
        &self,
        _site: &SiteConfig,
        _sinks: &SinkSet,
        page_limit: u32,
    ) -> Result<CrawlStats, CrawlError> {
        self.calls.0.lock().unwrap().push(page_limit);

        match self.behavior {
            Behavior::Succeed => Ok(CrawlStats {
                pages: page_limit,
                records: page_limit as usize,
                failed_pages: 0,
            }),
            Behavior::Fail(message) => Err(CrawlError::Other(message.to_string())),
            Behavior::Panic => panic!("selector blew up"),
            Behavior::WaitForRelease => {
                let _permit = self.gate.acquire().await.unwrap();
                Ok(CrawlStats::default())
            }
        }
    }
}
