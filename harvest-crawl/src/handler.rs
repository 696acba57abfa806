use async_trait::async_trait;
use harvest_core::domain::site::SiteConfig;

use crate::error::CrawlError;
use crate::sink::SinkSet;

/// Trait for crawl handlers.
///
/// A handler performs the actual work of a site job: fetching pages,
/// extracting records and writing them to every sink. The scheduler only
/// cares that the call returns or fails; how content is fetched is the
/// handler's own business.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use harvest_crawl::{CrawlError, CrawlHandler, CrawlRecord, CrawlStats, SinkSet, SiteConfig};
///
/// struct Static;
///
/// #[async_trait]
/// impl CrawlHandler for Static {
///     fn id(&self) -> &'static str {
///         "static"
///     }
///
///     async fn crawl(
///         &self,
///         site: &SiteConfig,
///         sinks: &SinkSet,
///         _page_limit: u32,
///     ) -> Result<CrawlStats, CrawlError> {
///         sinks.write(&CrawlRecord::new(&site.id, "about:blank", "hello")).await?;
///         Ok(CrawlStats { pages: 1, records: 1, failed_pages: 0 })
///     }
/// }
/// ```
#[async_trait]
pub trait CrawlHandler: Send + Sync {
    /// Returns the identifier of this handler, used in logs and listings.
    fn id(&self) -> &'static str;

    /// Crawls a site, writing every extracted record to `sinks`.
    ///
    /// # Arguments
    /// * `site` - The site configuration, including free-form parameters
    /// * `sinks` - Ordered storage sinks shared with every other job
    /// * `page_limit` - Maximum number of pages to fetch
    ///
    /// # Errors
    /// Returns `CrawlError` when the crawl as a whole failed. Partial page
    /// failures are handled inside the handler.
    async fn crawl(
        &self,
        site: &SiteConfig,
        sinks: &SinkSet,
        page_limit: u32,
    ) -> Result<CrawlStats, CrawlError>;
}

/// Counters reported by a finished crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: u32,
    pub records: usize,
    pub failed_pages: u32,
}
