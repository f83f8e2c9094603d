pub mod category;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod error;
pub mod frontier;
pub mod models;
pub mod pipeline;
pub mod quality;
pub mod text;
pub mod throttle;
pub mod traits;
pub mod util;


pub use classifier::Classifier;
pub use config::{CategoryKeywords, CrawlConfig};
pub use domain::AllowList;
pub use error::{CrawlError, RejectReason};
pub use frontier::Frontier;
pub use models::{Article, FrontierEntry, UNCATEGORIZED, compute_hash};
pub use pipeline::{CrawlPipeline, CrawlReporter, CrawlSummary, TracingCrawlReporter};
pub use quality::{QualityGate, Verdict};
pub use traits::{ArticleStore, CategoryMirror, Fetcher, LanguageDetector, PageParser, ParsedPage};
