//! Generic page crawler
//!
//! Default handler for every site category. Fetches a paginated listing
//! (`url` parameter with a `{page}` placeholder), extracts items with CSS
//! selectors and writes one record per item.
//!
//! Site parameters:
//! - `url` (required): page URL template, e.g. `https://host/list?page={page}`
//! - `item_selector`: selector of one record (category default otherwise)
//! - `title_selector`: selector of the title inside an item
//! - `content_selector`: selector of the body inside an item (whole item otherwise)

use async_trait::async_trait;
use harvest_core::domain::record::CrawlRecord;
use harvest_core::domain::site::{SiteCategory, SiteConfig};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::handler::{CrawlHandler, CrawlStats};
use crate::sink::SinkSet;

const PAGE_PLACEHOLDER: &str = "{page}";

/// Selectors used to turn a page into items
#[derive(Debug, Clone)]
struct ExtractRules {
    item: String,
    title: Option<String>,
    content: Option<String>,
}

impl ExtractRules {
    fn defaults(category: SiteCategory) -> Self {
        let (item, title, content) = match category {
            SiteCategory::Poem => (".poem, article", Some("h1, h2, .title"), Some(".content, p")),
            SiteCategory::University => (".news-item, article, li.news", Some("h2, h3, a"), None),
            SiteCategory::Wiki => ("#mw-content-text, article", Some("h1, .firstHeading"), Some("p")),
            SiteCategory::Joke => (".joke, article", Some(".title, h2"), Some(".content, p")),
        };
        Self {
            item: item.to_string(),
            title: title.map(str::to_string),
            content: content.map(str::to_string),
        }
    }

    /// Site parameters override the category defaults
    fn for_site(category: SiteCategory, site: &SiteConfig) -> Result<Self, CrawlError> {
        let mut rules = Self::defaults(category);
        if let Some(item) = site.param_str("item_selector") {
            rules.item = item.to_string();
        }
        if let Some(title) = site.param_str("title_selector") {
            rules.title = Some(title.to_string());
        }
        if let Some(content) = site.param_str("content_selector") {
            rules.content = Some(content.to_string());
        }

        parse_selector("item_selector", &rules.item)?;
        if let Some(title) = &rules.title {
            parse_selector("title_selector", title)?;
        }
        if let Some(content) = &rules.content {
            parse_selector("content_selector", content)?;
        }

        Ok(rules)
    }
}

fn parse_selector(name: &str, selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|e| CrawlError::invalid_parameter(name, e.to_string()))
}

/// An item extracted from a page
#[derive(Debug, Clone, PartialEq, Eq)]
struct Item {
    title: Option<String>,
    content: String,
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts items from an HTML page
///
/// Kept synchronous: `Html` is not `Send` and must never live across an await.
fn extract_items(html: &str, rules: &ExtractRules) -> Result<Vec<Item>, CrawlError> {
    let document = Html::parse_document(html);
    let item_selector = parse_selector("item_selector", &rules.item)?;
    let title_selector = rules
        .title
        .as_deref()
        .map(|s| parse_selector("title_selector", s))
        .transpose()?;
    let content_selector = rules
        .content
        .as_deref()
        .map(|s| parse_selector("content_selector", s))
        .transpose()?;

    let mut items = Vec::new();
    for element in document.select(&item_selector) {
        let title = title_selector
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .map(element_text)
            .filter(|t| !t.is_empty());

        let content = match &content_selector {
            Some(sel) => element
                .select(sel)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            None => element_text(element),
        };

        if content.is_empty() {
            continue;
        }
        items.push(Item { title, content });
    }

    Ok(items)
}

/// Default crawl handler of a site category
pub struct PageCrawler {
    category: SiteCategory,
    client: reqwest::Client,
}

impl PageCrawler {
    /// Creates the default crawler for `category`
    ///
    /// The HTTP client is shared so timeouts and connection pools are
    /// configured once by the caller.
    pub fn for_category(category: SiteCategory, client: reqwest::Client) -> Self {
        Self { category, client }
    }

    async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl CrawlHandler for PageCrawler {
    fn id(&self) -> &'static str {
        match self.category {
            SiteCategory::Poem => "poem-page-crawler",
            SiteCategory::University => "university-page-crawler",
            SiteCategory::Wiki => "wiki-page-crawler",
            SiteCategory::Joke => "joke-page-crawler",
        }
    }

    async fn crawl(
        &self,
        site: &SiteConfig,
        sinks: &SinkSet,
        page_limit: u32,
    ) -> Result<CrawlStats, CrawlError> {
        let template = site
            .param_str("url")
            .ok_or_else(|| CrawlError::invalid_parameter("url", "missing"))?;
        let rules = ExtractRules::for_site(self.category, site)?;
        let paginated = template.contains(PAGE_PLACEHOLDER);

        let mut stats = CrawlStats::default();
        let mut attempted = 0;
        let mut last_error = None;

        for page in 1..=page_limit {
            if !paginated && page > 1 {
                break;
            }
            attempted += 1;

            let url = template.replace(PAGE_PLACEHOLDER, &page.to_string());
            debug!("Fetching page {} of site {}: {}", page, site.id, url);

            let html = match self.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Site {} page {} failed: {}", site.id, page, e);
                    stats.failed_pages += 1;
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let items = extract_items(&html, &rules)?;
            stats.pages += 1;

            for item in items {
                let mut record = CrawlRecord::new(&site.id, &url, item.content)
                    .with_category(Some(self.category));
                record.title = item.title;
                sinks.write(&record).await?;
                stats.records += 1;
            }
        }

        if stats.pages == 0 && attempted > 0 {
            return Err(CrawlError::NoPagesFetched {
                attempted,
                last_error: last_error.unwrap_or_default(),
            });
        }

        info!(
            "Site {} crawled: {} page(s), {} record(s), {} failed page(s)",
            site.id, stats.pages, stats.records, stats.failed_pages
        );

        Ok(stats)
    }
}
