pub mod config;
pub mod database;
pub mod frontier;
pub mod mirror;
pub mod registry;
pub mod repository;
pub mod splitter;

pub use config::DatabaseConfig;
pub use database::Database;
pub use frontier::SqliteFrontier;
pub use mirror::SqliteCategoryMirror;
pub use registry::{CategoryStore, CategoryStoreRegistry, SchemaRegistry};
pub use repository::ArticleRepository;
pub use splitter::{CategorySplitter, SplitReport};
