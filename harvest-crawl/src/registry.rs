//! Handler registry
//!
//! Startup-time registration table mapping site identifiers and categories
//! to crawl handlers. Resolution is a pure lookup with a two-level fallback:
//! an exact site match first, then the default handler of the site's
//! category hint.

use harvest_core::domain::site::{SiteCategory, SiteConfig};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::handler::CrawlHandler;

/// How a handler was found for a site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Registered under the exact site identifier
    Exact,
    /// Default handler of the site's category
    Category(SiteCategory),
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Exact => write!(f, "exact"),
            Resolution::Category(c) => write!(f, "category:{}", c),
        }
    }
}

/// A handler selected for a site
#[derive(Clone)]
pub struct ResolvedHandler {
    pub handler: Arc<dyn CrawlHandler>,
    pub resolution: Resolution,
}

impl fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("handler", &self.handler.id())
            .field("resolution", &self.resolution)
            .finish()
    }
}

/// Registry of crawl handlers
///
/// Built once at startup and shared read-only afterwards, so resolution is
/// safe to call from any number of dispatch tasks.
#[derive(Default)]
pub struct HandlerRegistry {
    by_site: HashMap<String, Arc<dyn CrawlHandler>>,
    by_category: HashMap<SiteCategory, Arc<dyn CrawlHandler>>,
}

impl HandlerRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bespoke handler for one site
    ///
    /// # Panics
    /// Panics if a handler is already registered for `site_id`
    pub fn register_site<H: CrawlHandler + 'static>(&mut self, site_id: impl Into<String>, handler: H) {
        let site_id = site_id.into();
        if self.by_site.contains_key(&site_id) {
            panic!("Handler for site '{}' is already registered", site_id);
        }
        self.by_site.insert(site_id, Arc::new(handler));
    }

    /// Registers the default handler shared by every site of a category
    ///
    /// # Panics
    /// Panics if a default is already registered for `category`
    pub fn register_category<H: CrawlHandler + 'static>(&mut self, category: SiteCategory, handler: H) {
        if self.by_category.contains_key(&category) {
            panic!("Default handler for category '{}' is already registered", category);
        }
        self.by_category.insert(category, Arc::new(handler));
    }

    /// Resolves the handler for a site
    ///
    /// # Errors
    /// Returns `ResolveError::NoHandlerFound` when neither the site id nor a
    /// recognised category hint has a registered handler
    pub fn resolve(&self, site_id: &str, site: &SiteConfig) -> Result<ResolvedHandler, ResolveError> {
        if let Some(handler) = self.by_site.get(site_id) {
            return Ok(ResolvedHandler {
                handler: Arc::clone(handler),
                resolution: Resolution::Exact,
            });
        }

        site.known_category()
            .and_then(|category| {
                self.by_category.get(&category).map(|handler| ResolvedHandler {
                    handler: Arc::clone(handler),
                    resolution: Resolution::Category(category),
                })
            })
            .ok_or_else(|| ResolveError::NoHandlerFound {
                site_id: site_id.to_string(),
                hint: site.category.clone().unwrap_or_else(|| "<none>".to_string()),
            })
    }

    /// Number of registered handlers (site and category)
    pub fn len(&self) -> usize {
        self.by_site.len() + self.by_category.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
