//! Site domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Configuration of a single crawl site (one scheduled job)
///
/// Loaded once from the site file and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site identifier (injected from the map key of the site file)
    #[serde(skip)]
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Identifier of the handler meant to crawl this site
    #[serde(default)]
    pub handler: String,

    /// Category hint, only consulted when no handler is registered for `id`
    #[serde(default)]
    pub category: Option<String>,

    /// Free-form handler parameters (URL templates, selectors, page limit...)
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl SiteConfig {
    /// Creates a site with no category hint and no parameters
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            handler: String::new(),
            category: None,
            parameters: HashMap::new(),
        }
    }

    /// Sets the handler identifier
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    /// Sets the category hint
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Adds a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Returns the category hint if it names one of the known categories
    pub fn known_category(&self) -> Option<SiteCategory> {
        self.category.as_deref().and_then(SiteCategory::parse)
    }

    /// Returns a string parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    /// Page limit configured for this site, if any
    ///
    /// Accepts both numbers and numeric strings since site files are hand written.
    pub fn max_pages(&self) -> Option<u32> {
        match self.parameters.get("max_pages")? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Closed set of site categories that have a shared default handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteCategory {
    Poem,
    University,
    Wiki,
    Joke,
}

impl SiteCategory {
    /// All known categories
    pub const ALL: [SiteCategory; 4] = [
        SiteCategory::Poem,
        SiteCategory::University,
        SiteCategory::Wiki,
        SiteCategory::Joke,
    ];

    /// Parses a category hint, case-insensitively
    pub fn parse(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "poem" => Some(SiteCategory::Poem),
            "university" => Some(SiteCategory::University),
            "wiki" => Some(SiteCategory::Wiki),
            "joke" => Some(SiteCategory::Joke),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteCategory::Poem => "poem",
            SiteCategory::University => "university",
            SiteCategory::Wiki => "wiki",
            SiteCategory::Joke => "joke",
        }
    }
}

impl fmt::Display for SiteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
