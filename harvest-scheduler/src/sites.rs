//! Site registry
//!
//! Ordered, read-only set of site configurations loaded once from the site
//! file. Entry order is the batch launch order and the per-site trigger
//! index.

use harvest_core::domain::site::SiteConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteLoadError {
    #[error("failed to read site file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse site file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("site file must be a mapping of site id to site configuration")]
    NotAMapping,

    #[error("site id must be a non-empty string, got {0:?}")]
    InvalidId(String),

    #[error("invalid configuration for site '{id}': {source}")]
    InvalidSite {
        id: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Read-only registry of configured sites
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: Vec<Arc<SiteConfig>>,
    index: HashMap<String, usize>,
}

impl SiteRegistry {
    /// Builds a registry from sites in launch order
    ///
    /// A later site with an already-seen id replaces the earlier one in place.
    pub fn new(sites: impl IntoIterator<Item = SiteConfig>) -> Self {
        let mut registry = Self::default();
        for site in sites {
            match registry.index.get(&site.id) {
                Some(&i) => registry.sites[i] = Arc::new(site),
                None => {
                    registry.index.insert(site.id.clone(), registry.sites.len());
                    registry.sites.push(Arc::new(site));
                }
            }
        }
        registry
    }

    /// Loads the site file at `path`
    pub fn load(path: &Path) -> Result<Self, SiteLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SiteLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Parses a YAML mapping of `site_id -> site configuration`
    pub fn from_yaml(contents: &str) -> Result<Self, SiteLoadError> {
        let document: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mapping = match document {
            serde_yaml::Value::Mapping(mapping) => mapping,
            // An empty file is an empty registry
            serde_yaml::Value::Null => return Ok(Self::default()),
            _ => return Err(SiteLoadError::NotAMapping),
        };

        let mut sites = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let id = match key {
                serde_yaml::Value::String(id) if !id.trim().is_empty() => id,
                other => return Err(SiteLoadError::InvalidId(format!("{:?}", other))),
            };
            let mut site: SiteConfig = serde_yaml::from_value(value)
                .map_err(|source| SiteLoadError::InvalidSite { id: id.clone(), source })?;
            site.id = id;
            sites.push(site);
        }

        Ok(Self::new(sites))
    }

    pub fn get(&self, id: &str) -> Option<Arc<SiteConfig>> {
        self.index.get(id).map(|&i| Arc::clone(&self.sites[i]))
    }

    /// Sites in load order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SiteConfig>> {
        self.sites.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
