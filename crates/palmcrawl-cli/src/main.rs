use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use palmcrawl_client::{HtmlPageParser, ReqwestFetcher, WhatlangDetector};
use palmcrawl_core::throttle::{ThrottleConfig, ThrottledFetcher};
use palmcrawl_core::util::parse_seed_list;
use palmcrawl_core::{
    AllowList, ArticleStore, CrawlConfig, CrawlPipeline, Frontier, TracingCrawlReporter,
};
use palmcrawl_db::config::DEFAULT_DB_PATH;
use palmcrawl_db::{CategorySplitter, Database, DatabaseConfig, SqliteCategoryMirror};

/// Seed list used when neither `--seeds` nor the config file provides one.
const DEFAULT_SEEDS: &str = include_str!("../../../config/seeds.txt");

#[derive(Parser)]
#[command(name = "palmcrawl", version, about = "Oil palm research crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from the seed list, classifying and storing accepted pages
    Crawl {
        /// JSON config file; missing keys keep their defaults
        #[arg(short, long, env = "PALMCRAWL_CONFIG")]
        config: Option<PathBuf>,

        /// Primary SQLite store
        #[arg(long, env = "PALMCRAWL_DB", default_value = DEFAULT_DB_PATH)]
        db: PathBuf,

        /// Seed file, one url per line (`#` starts a comment)
        #[arg(short, long)]
        seeds: Option<PathBuf>,

        /// Also write each accepted article into `<category>.db`
        #[arg(long, default_value_t = false)]
        mirror_category_dbs: bool,

        /// Directory for category stores (defaults to the store's folder)
        #[arg(long)]
        mirror_dir: Option<PathBuf>,

        #[arg(long)]
        max_depth: Option<u32>,

        /// Stop after this many accepted articles
        #[arg(long)]
        max_items: Option<usize>,

        /// Concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Split a SQLite database into one database per category
    Split {
        /// Source database
        #[arg(long, env = "PALMCRAWL_DB", default_value = DEFAULT_DB_PATH)]
        db: PathBuf,

        /// Output directory (defaults to the source's folder)
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Copy tables without a category column into Uncategorized
        #[arg(long, default_value_t = false)]
        include_noncategory: bool,
    },

    /// Show frontier and article counts
    Status {
        #[arg(long, env = "PALMCRAWL_DB", default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
    },

    /// Export stored articles as CSV
    Export {
        #[arg(long, env = "PALMCRAWL_DB", default_value = DEFAULT_DB_PATH)]
        db: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of articles to export
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only export articles of this category
        #[arg(long)]
        category: Option<String>,
    },
}

/// Flag overrides applied on top of the loaded config.
struct CrawlOverrides {
    seeds: Option<PathBuf>,
    mirror_category_dbs: bool,
    mirror_dir: Option<PathBuf>,
    max_depth: Option<u32>,
    max_items: Option<usize>,
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("palmcrawl=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            config,
            db,
            seeds,
            mirror_category_dbs,
            mirror_dir,
            max_depth,
            max_items,
            workers,
        } => {
            let overrides = CrawlOverrides {
                seeds,
                mirror_category_dbs,
                mirror_dir,
                max_depth,
                max_items,
                workers,
            };
            cmd_crawl(config.as_deref(), &db, overrides).await?;
        }
        Commands::Split {
            db,
            outdir,
            include_noncategory,
        } => {
            cmd_split(&db, outdir, include_noncategory).await?;
        }
        Commands::Status { db } => {
            cmd_status(&db).await?;
        }
        Commands::Export {
            db,
            output,
            limit,
            category,
        } => {
            cmd_export(&db, output.as_deref(), limit, category.as_deref()).await?;
        }
    }

    Ok(())
}

/// Open the primary store, running migrations.
async fn connect_db(path: &Path) -> Result<Database> {
    let config = DatabaseConfig::from_env()
        .context("Invalid database configuration")?
        .with_path(path);
    let db = Database::connect(&config)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    db.migrate().await.context("Failed to migrate database")?;
    Ok(db)
}

fn load_config(path: Option<&Path>, overrides: &CrawlOverrides) -> Result<CrawlConfig> {
    let mut config = match path {
        Some(path) => CrawlConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CrawlConfig::default(),
    };

    if let Some(max_depth) = overrides.max_depth {
        config = config.with_max_depth(max_depth);
    }
    if let Some(max_items) = overrides.max_items {
        config = config.with_max_items(max_items);
    }
    if let Some(workers) = overrides.workers {
        config = config.with_workers(workers);
    }
    if overrides.mirror_category_dbs {
        config.mirror_category_dbs = true;
    }
    if overrides.mirror_dir.is_some() {
        config.mirror_dir = overrides.mirror_dir.clone();
    }

    if let Some(seed_file) = &overrides.seeds {
        let text = std::fs::read_to_string(seed_file)
            .with_context(|| format!("Failed to read seed file {}", seed_file.display()))?;
        config = config.with_seeds(parse_seed_list(&text));
    } else if config.seeds.is_empty() {
        config = config.with_seeds(parse_seed_list(DEFAULT_SEEDS));
    }

    config.validate().context("Invalid crawl configuration")?;
    Ok(config)
}

async fn cmd_crawl(config_path: Option<&Path>, db_path: &Path, overrides: CrawlOverrides) -> Result<()> {
    let config = load_config(config_path, &overrides)?;
    let db = connect_db(db_path).await?;

    let mirror = config.mirror_category_dbs.then(|| match &config.mirror_dir {
        Some(dir) => SqliteCategoryMirror::new(dir),
        None => SqliteCategoryMirror::beside(db_path),
    });

    let fetcher = ReqwestFetcher::with_options(&config.user_agent, config.request_timeout())
        .context("Failed to create HTTP client")?;
    let fetcher = ThrottledFetcher::new(fetcher, ThrottleConfig::from_crawl(&config));

    let pipeline = CrawlPipeline::new(
        fetcher,
        HtmlPageParser::new(),
        WhatlangDetector::new(),
        db.frontier(AllowList::new(&config.reputable_domains)),
        db.articles(),
        mirror,
        &config,
    );

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight pages");
            signal_token.cancel();
        }
    });

    tracing::info!(
        seeds = config.seeds.len(),
        workers = config.workers,
        max_depth = config.max_depth,
        db = %db_path.display(),
        "Starting crawl"
    );

    let result = pipeline
        .run(&config.seeds, cancel_token, &TracingCrawlReporter)
        .await;
    db.close().await;
    let summary = result.context("Crawl aborted")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cmd_split(db_path: &Path, outdir: Option<PathBuf>, include_noncategory: bool) -> Result<()> {
    let outdir = outdir.unwrap_or_else(|| {
        db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let report = CategorySplitter::new(&outdir)
        .include_noncategory(include_noncategory)
        .run(db_path)
        .await
        .with_context(|| format!("Failed to split {}", db_path.display()))?;

    println!(
        "Split {} into {} ({} tables, {} rows read, {} rows written, {} failed):\n",
        db_path.display(),
        outdir.display(),
        report.tables_processed.len(),
        report.rows_read,
        report.rows_written(),
        report.failed_rows
    );
    for (category, tables) in &report.rows_by_table {
        let total = report.rows_by_category.get(category).copied().unwrap_or(0);
        println!("  {category}: {total} rows");
        for (table, rows) in tables {
            println!("    {table}: {rows}");
        }
    }
    for (table, reason) in &report.tables_skipped {
        println!("  skipped {table}: {reason}");
    }
    if !report.outputs.is_empty() {
        println!("\nCategory databases:");
        for path in report.outputs.values() {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

async fn cmd_status(db_path: &Path) -> Result<()> {
    let db = connect_db(db_path).await?;
    let frontier = db.frontier(AllowList::default());
    let articles = db.articles();

    let pending = frontier.pending_count().await?;
    let visited = frontier.visited_count().await?;
    let total = articles.count().await?;
    let by_category = articles.category_counts().await?;
    db.close().await;

    println!("Store: {}\n", db_path.display());
    println!("  pending urls:  {pending}");
    println!("  visited urls:  {visited}");
    println!("  articles:      {total}");
    for (category, count) in by_category {
        println!("    {category}: {count}");
    }

    Ok(())
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    url: &'a str,
    title: &'a str,
    category: &'a str,
    scraped_date: String,
    hash: &'a str,
    content: &'a str,
}

async fn cmd_export(
    db_path: &Path,
    output: Option<&Path>,
    limit: Option<usize>,
    category: Option<&str>,
) -> Result<()> {
    let db = connect_db(db_path).await?;
    let repo = db.articles();
    let articles = match category {
        Some(category) => repo.by_category(category).await.map(|mut found| {
            found.truncate(limit.unwrap_or(usize::MAX));
            found
        }),
        None => repo.enumerate(limit).await,
    };
    db.close().await;
    let articles = articles.context("Failed to read articles")?;

    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = csv::Writer::from_writer(sink);
    for article in &articles {
        writer.serialize(ExportRecord {
            url: &article.url,
            title: &article.title,
            category: &article.category,
            scraped_date: article.scraped_at.to_rfc3339(),
            hash: &article.content_hash,
            content: &article.content,
        })?;
    }
    writer.flush()?;

    tracing::info!(count = articles.len(), "Exported articles");
    Ok(())
}
