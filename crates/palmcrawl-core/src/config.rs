use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::AllowList;
use crate::error::CrawlError;

/// A category and the keyword phrases that vote for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryKeywords {
    pub fn new<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Agronomy categories, in tie-break order.
pub fn default_categories() -> Vec<CategoryKeywords> {
    vec![
        CategoryKeywords::new(
            "Cultivation",
            [
                "cultivation",
                "planting",
                "growth",
                "sowing",
                "harvesting",
                "agronomy",
            ],
        ),
        CategoryKeywords::new(
            "Processing",
            [
                "processing",
                "extraction",
                "refining",
                "mill",
                "oil extraction",
                "fruit bunch",
            ],
        ),
        CategoryKeywords::new(
            "Environmental Impact",
            [
                "environment",
                "biodiversity",
                "deforestation",
                "sustainability",
                "climate change",
                "impact",
            ],
        ),
        CategoryKeywords::new(
            "Market Trends",
            [
                "market",
                "trends",
                "price",
                "trade",
                "economy",
                "production",
                "export",
            ],
        ),
        CategoryKeywords::new(
            "Plantation Management",
            [
                "plantation",
                "management",
                "yield",
                "pests",
                "irrigation",
                "soil",
                "farm",
            ],
        ),
    ]
}

/// Hosts considered credible sources for oil palm research.
pub fn default_reputable_domains() -> Vec<String> {
    [
        "eos.com",
        "ourworldindata.org",
        "iucn.org",
        "farmonaut.com",
        "cabiagbio.biomedcentral.com",
        "sciencedirect.com",
        "ocl-journal.org",
        "frontiersin.org",
        "researchgate.net",
        "sustainablepalmoilchoice.eu",
        "pmc.ncbi.nlm.nih.gov",
        "intechopen.com",
        "epthinktank.eu",
        "onlinelibrary.wiley.com",
        "annualreviews.org",
        "cambridge.org",
        "nature.com",
        "fao.org",
        "mdpi.com",
        "aocs.org",
        "mongabay.com",
        "custommarketinsights.com",
        "iisd.org",
        "en.wikipedia.org",
        "earth.org",
        "zsl.org",
        "iopscience.iop.org",
        "unu.edu",
        "plos.org",
        "worldwildlife.org",
        "unl.edu",
        "academicjournals.org",
        "cifor.org",
        "conservation.org",
        "monash.edu",
        "doi.org",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Static crawl configuration.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Hosts allowed for link admission and as article sources.
    pub reputable_domains: Vec<String>,
    /// Categories in tie-break order.
    pub categories: Vec<CategoryKeywords>,
    /// Urls enqueued at depth 0 on every start.
    pub seeds: Vec<String>,
    pub max_depth: u32,
    pub min_content_length: usize,
    /// ISO 639-1 code pages must be written in.
    pub target_language: String,
    /// Stop after this many accepted articles.
    pub max_items: Option<usize>,
    pub workers: usize,
    /// Minimum spacing between requests to the same domain.
    pub fetch_delay_ms: u64,
    /// Pause after each stored article.
    pub settle_delay_ms: u64,
    /// How long a worker waits for in-flight pages to add links before
    /// polling an empty frontier again.
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub mirror_category_dbs: bool,
    /// Directory for category stores; defaults to the primary store's folder.
    pub mirror_dir: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            reputable_domains: default_reputable_domains(),
            categories: default_categories(),
            seeds: Vec::new(),
            max_depth: 3,
            min_content_length: 100,
            target_language: "en".to_string(),
            max_items: None,
            workers: 1,
            fetch_delay_ms: 1_000,
            settle_delay_ms: 2_000,
            poll_interval_ms: 500,
            request_timeout_secs: 10,
            user_agent: concat!(
                "palmcrawl/",
                env!("CARGO_PKG_VERSION"),
                " (+oil palm research crawler)"
            )
            .to_string(),
            mirror_category_dbs: false,
            mirror_dir: None,
        }
    }
}

impl CrawlConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, CrawlError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CrawlError::ConfigError(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.workers == 0 {
            return Err(CrawlError::ConfigError("workers must be at least 1".into()));
        }
        if AllowList::new(&self.reputable_domains).is_empty() {
            return Err(CrawlError::ConfigError(
                "reputable_domains must not be empty".into(),
            ));
        }
        if self.categories.iter().any(|c| c.name.trim().is_empty()) {
            return Err(CrawlError::ConfigError(
                "category names must not be blank".into(),
            ));
        }
        if self.max_items == Some(0) {
            return Err(CrawlError::ConfigError(
                "max_items must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    pub fn with_seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seeds = seeds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Zero every politeness delay (tests and local runs).
    pub fn without_delays(mut self) -> Self {
        self.fetch_delay_ms = 0;
        self.settle_delay_ms = 0;
        self.poll_interval_ms = 10;
        self
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
