//! Dispatcher
//!
//! Runs site handlers as independent tokio tasks and records every outcome
//! in the run registry. Every error on one site's path is caught here and
//! turned into a failed run record; nothing propagates to sibling jobs or
//! to the scheduling loop.

use harvest_core::domain::run::{RunOutcome, RunRecord};
use harvest_core::domain::site::SiteConfig;
use harvest_crawl::{CrawlStats, HandlerRegistry, ResolveError, SinkSet};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::service::run_registry::RunRegistry;
use crate::sites::SiteRegistry;

/// Errors on a single site's dispatch path
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Site id not in the registry
    #[error("unknown site '{0}'")]
    UnknownJob(String),

    /// A run of the site is already active
    #[error("site '{0}' is already running")]
    AlreadyRunning(String),

    #[error(transparent)]
    NoHandlerFound(#[from] ResolveError),

    /// The handler failed or panicked
    #[error("{0}")]
    Execution(String),
}

/// Result of dispatching one site
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Handler returned normally
    Succeeded(CrawlStats),
    /// Nothing was run and the run record was not touched
    Skipped(DispatchError),
    /// The run was recorded as failed
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Succeeded(_))
    }

    pub fn is_already_running(&self) -> bool {
        matches!(self, DispatchOutcome::Skipped(DispatchError::AlreadyRunning(_)))
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Succeeded(stats) => write!(
                f,
                "succeeded ({} page(s), {} record(s))",
                stats.pages, stats.records
            ),
            DispatchOutcome::Skipped(e) => write!(f, "skipped: {}", e),
            DispatchOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Tunables of the dispatcher
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Page limit for sites without a `max_pages` parameter
    pub default_page_limit: u32,
    /// Pause between two launches of a batch
    pub launch_delay: Duration,
    /// Maximum number of handlers executing at the same time
    pub max_concurrent_jobs: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_page_limit: 3,
            launch_delay: Duration::from_secs(5),
            max_concurrent_jobs: 4,
        }
    }
}

pub struct Dispatcher {
    sites: Arc<SiteRegistry>,
    handlers: Arc<HandlerRegistry>,
    runs: Arc<RunRegistry>,
    sinks: SinkSet,
    slots: Arc<Semaphore>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        sites: Arc<SiteRegistry>,
        handlers: Arc<HandlerRegistry>,
        runs: Arc<RunRegistry>,
        sinks: SinkSet,
        settings: DispatchSettings,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(settings.max_concurrent_jobs));
        Self {
            sites,
            handlers,
            runs,
            sinks,
            slots,
            settings,
        }
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    /// Current run record of every configured site, in load order
    pub fn status(&self) -> Vec<RunRecord> {
        self.sites.ids().map(|id| self.runs.snapshot(id)).collect()
    }

    /// Runs one site to completion
    pub async fn run_one(&self, site_id: &str) -> DispatchOutcome {
        match self.claim(site_id) {
            Ok(site) => self.execute(site).await,
            Err(e) => DispatchOutcome::Skipped(e),
        }
    }

    /// Launches every site in load order, pausing `launch_delay` between launches
    ///
    /// Each site is claimed before its task is spawned, so every launched site
    /// is already `running` when this returns. Does not wait for completion.
    pub async fn run_all(self: &Arc<Self>) -> Batch {
        info!(
            "Launching batch of {} site(s) (delay {:?})",
            self.sites.len(),
            self.settings.launch_delay
        );

        let mut launches = Vec::with_capacity(self.sites.len());

        for (index, site) in self.sites.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.launch_delay).await;
            }

            info!("[{}/{}] Launching site {} ({})", index + 1, self.sites.len(), site.name, site.id);

            let launch = match self.claim(&site.id) {
                Ok(site) => {
                    let this = Arc::clone(self);
                    Launch::Spawned(tokio::spawn(async move { this.execute(site).await }))
                }
                Err(e) => Launch::Done(DispatchOutcome::Skipped(e)),
            };
            launches.push((site.id.clone(), launch));
        }

        Batch { launches }
    }

    /// Looks the site up and claims it in the run registry
    fn claim(&self, site_id: &str) -> Result<Arc<SiteConfig>, DispatchError> {
        let Some(site) = self.sites.get(site_id) else {
            error!("Site {} is not configured", site_id);
            return Err(DispatchError::UnknownJob(site_id.to_string()));
        };

        if !self.runs.try_begin(site_id) {
            warn!("Site {} is already running, skipping", site_id);
            return Err(DispatchError::AlreadyRunning(site_id.to_string()));
        }

        Ok(site)
    }

    /// Executes a claimed site and completes its run record
    async fn execute(&self, site: Arc<SiteConfig>) -> DispatchOutcome {
        let result = self.execute_inner(&site).await;

        match result {
            Ok(stats) => {
                self.runs.complete(&site.id, RunOutcome::Succeeded, None);
                info!(
                    "Site {} finished: {} page(s), {} record(s)",
                    site.id, stats.pages, stats.records
                );
                DispatchOutcome::Succeeded(stats)
            }
            Err(e) => {
                self.runs
                    .complete(&site.id, RunOutcome::Failed, Some(e.to_string()));
                error!("Site {} failed: {}", site.id, e);
                DispatchOutcome::Failed(e)
            }
        }
    }

    async fn execute_inner(&self, site: &Arc<SiteConfig>) -> Result<CrawlStats, DispatchError> {
        let resolved = self.handlers.resolve(&site.id, site)?;

        // Claimed sites wait here for a free slot while staying `running`.
        let _permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| DispatchError::Execution(format!("dispatcher closed: {}", e)))?;

        let page_limit = site.max_pages().unwrap_or(self.settings.default_page_limit);
        info!(
            "Running site {} with handler {} ({}), page limit {}",
            site.id,
            resolved.handler.id(),
            resolved.resolution,
            page_limit
        );

        // The handler gets its own task so a panic is reported through the
        // join handle instead of unwinding through the dispatcher.
        let handler = resolved.handler;
        let task_site = Arc::clone(site);
        let sinks = self.sinks.clone();
        let joined =
            tokio::spawn(async move { handler.crawl(&task_site, &sinks, page_limit).await }).await;

        match joined {
            Ok(Ok(stats)) => Ok(stats),
            Ok(Err(e)) => Err(DispatchError::Execution(e.to_string())),
            Err(e) if e.is_panic() => Err(DispatchError::Execution(format!(
                "handler panicked: {}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(DispatchError::Execution(format!("handler task cancelled: {}", e))),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

enum Launch {
    Spawned(JoinHandle<DispatchOutcome>),
    Done(DispatchOutcome),
}

/// Sites launched by one `run_all`
pub struct Batch {
    launches: Vec<(String, Launch)>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.launches.len()
    }

    /// Waits for every launched site and tallies the outcomes
    pub async fn wait(self) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for (site_id, launch) in self.launches {
            let outcome = match launch {
                Launch::Done(outcome) => outcome,
                Launch::Spawned(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Dispatch task of site {} aborted: {}", site_id, e);
                        DispatchOutcome::Failed(DispatchError::Execution(e.to_string()))
                    }
                },
            };

            match outcome {
                DispatchOutcome::Succeeded(_) => summary.succeeded += 1,
                DispatchOutcome::Failed(_) => summary.failed += 1,
                DispatchOutcome::Skipped(_) => summary.skipped += 1,
            }
        }

        summary
    }
}

/// Outcome counts of a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded, self.failed, self.skipped
        )
    }
}
