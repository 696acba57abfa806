//! Crawled record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::site::SiteCategory;

/// One item extracted by a crawl handler and handed to the storage sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub id: Uuid,
    pub site_id: String,
    pub category: Option<SiteCategory>,
    /// Page the item was extracted from
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

impl CrawlRecord {
    pub fn new(site_id: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id: site_id.into(),
            category: None,
            url: url.into(),
            title: None,
            content: content.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_category(mut self, category: Option<SiteCategory>) -> Self {
        self.category = category;
        self
    }
}
