use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use futures::StreamExt;
use palmcrawl_core::category::{categories_or_default, find_category_column, sanitize_slug};
use palmcrawl_core::{CrawlError, UNCATEGORIZED};
use regex::Regex;
use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction, TypeInfo, ValueRef};

use crate::database::db_error;
use crate::registry::{CategoryStore, CategoryStoreRegistry, SchemaRegistry};

/// Rows read from the source per batch.
pub const FETCH_BATCH: usize = 1000;

static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?").expect("valid regex")
});

/// Tables that belong to the store's own bookkeeping.
const INTERNAL_TABLES: &[&str] = &["_sqlx_migrations"];

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Declared `CREATE TABLE` rewritten so it can run against an existing store.
fn rewrite_declared_ddl(sql: &str) -> Option<String> {
    CREATE_TABLE
        .is_match(sql)
        .then(|| CREATE_TABLE.replace(sql, "CREATE TABLE IF NOT EXISTS ").into_owned())
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ColumnInfo {
    name: String,
    #[sqlx(rename = "type")]
    decl_type: String,
    notnull: i64,
    dflt_value: Option<String>,
    pk: i64,
}

/// `CREATE TABLE` rebuilt from column metadata.
fn reconstruct_ddl(table: &str, columns: &[ColumnInfo]) -> Option<String> {
    if columns.is_empty() {
        return None;
    }
    let mut pk: Vec<&ColumnInfo> = columns.iter().filter(|c| c.pk > 0).collect();
    pk.sort_by_key(|c| c.pk);

    let mut parts: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut def = quote_ident(&c.name);
            def.push(' ');
            def.push_str(if c.decl_type.is_empty() {
                "TEXT"
            } else {
                &c.decl_type
            });
            if c.notnull != 0 {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = &c.dflt_value {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            if pk.len() == 1 && c.pk > 0 {
                def.push_str(" PRIMARY KEY");
            }
            def
        })
        .collect();
    if pk.len() > 1 {
        let keys: Vec<String> = pk.iter().map(|c| quote_ident(&c.name)).collect();
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    Some(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quote_ident(table),
        parts.join(",\n  ")
    ))
}

/// A cell copied verbatim between stores.
#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    fn read(row: &SqliteRow, idx: usize) -> Result<Self, sqlx::Error> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let value = match raw.type_info().name() {
            "INTEGER" => SqlValue::Integer(row.try_get_unchecked(idx)?),
            "REAL" => SqlValue::Real(row.try_get_unchecked(idx)?),
            "BLOB" => SqlValue::Blob(row.try_get_unchecked(idx)?),
            // TEXT is not checked for valid UTF-8 on write; keep such bytes as a BLOB
            _ => {
                let bytes: Vec<u8> = row.try_get_unchecked(idx)?;
                match String::from_utf8(bytes) {
                    Ok(text) => SqlValue::Text(text),
                    Err(e) => SqlValue::Blob(e.into_bytes()),
                }
            }
        };
        Ok(value)
    }

    /// Cell as category text, `None` for NULL.
    fn as_category(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Real(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Blob(b) => query.bind(b.as_slice()),
        };
    }
    query
}

/// A source table selected for splitting.
#[derive(Debug, Clone)]
struct TablePlan {
    name: String,
    columns: Vec<String>,
    category_index: Option<usize>,
    declared_ddl: Option<String>,
    fallback_ddl: Option<String>,
    has_primary_key: bool,
}

impl TablePlan {
    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn insert_sql(&self, conflict: &str) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT OR {conflict} INTO {} ({}) VALUES ({placeholders})",
            quote_ident(&self.name),
            self.column_list()
        )
    }
}

/// Outcome of a split run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SplitReport {
    pub tables_processed: Vec<String>,
    /// (table, reason)
    pub tables_skipped: Vec<(String, String)>,
    pub rows_read: usize,
    /// Rows written per category name.
    pub rows_by_category: BTreeMap<String, usize>,
    /// Rows written per category name, then table.
    pub rows_by_table: BTreeMap<String, BTreeMap<String, usize>>,
    pub failed_rows: usize,
    /// Category store files by slug.
    pub outputs: BTreeMap<String, PathBuf>,
}

impl SplitReport {
    pub fn rows_written(&self) -> usize {
        self.rows_by_category.values().sum()
    }
}

/// Splits a SQLite database into one database per category.
///
/// Every user table with a category-like column is copied row by row into
/// `<out_dir>/<slug>.db` for each category the row carries, so a row tagged
/// with two categories lands in two stores.
#[derive(Debug, Clone)]
pub struct CategorySplitter {
    out_dir: PathBuf,
    include_noncategory: bool,
    batch_size: usize,
}

impl CategorySplitter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            include_noncategory: false,
            batch_size: FETCH_BATCH,
        }
    }

    /// Copy tables without a category column into `Uncategorized`.
    pub fn include_noncategory(mut self, include: bool) -> Self {
        self.include_noncategory = include;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Split `source`. The source must not be written to meanwhile.
    pub async fn run(&self, source: &Path) -> Result<SplitReport, CrawlError> {
        if !source.is_file() {
            return Err(CrawlError::ConfigError(format!(
                "Source database not found: {}",
                source.display()
            )));
        }

        let source_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(source)
                    .read_only(true),
            )
            .await
            .map_err(|e| {
                CrawlError::DatabaseError(format!("Failed to open {}: {e}", source.display()))
            })?;

        let mut report = SplitReport::default();
        let mut registry = CategoryStoreRegistry::new(&self.out_dir);
        let mut schemas = SchemaRegistry::default();

        let result = self
            .split_tables(&source_pool, &mut registry, &mut schemas, &mut report)
            .await;

        report.outputs = registry.paths();
        registry.close_all().await;
        source_pool.close().await;
        result?;

        tracing::info!(
            tables = report.tables_processed.len(),
            skipped = report.tables_skipped.len(),
            rows_read = report.rows_read,
            rows_written = report.rows_written(),
            failed_rows = report.failed_rows,
            stores = report.outputs.len(),
            "Split finished"
        );
        Ok(report)
    }

    async fn split_tables(
        &self,
        source: &SqlitePool,
        registry: &mut CategoryStoreRegistry,
        schemas: &mut SchemaRegistry,
        report: &mut SplitReport,
    ) -> Result<(), CrawlError> {
        let tables: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT name, sql FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY rowid
            "#,
        )
        .fetch_all(source)
        .await
        .map_err(db_error)?;

        if tables.is_empty() {
            tracing::warn!("No user tables found in the source database");
        }

        for (name, sql) in tables {
            match self.plan_table(source, &name, sql.as_deref()).await? {
                Ok(plan) => {
                    tracing::info!(
                        table = %plan.name,
                        columns = plan.columns.len(),
                        category_column = ?plan.category_index.map(|i| &plan.columns[i]),
                        "Processing table"
                    );
                    self.split_table(source, &plan, registry, schemas, report)
                        .await?;
                    report.tables_processed.push(plan.name);
                }
                Err(reason) => {
                    tracing::warn!(table = %name, %reason, "Skipping table");
                    report.tables_skipped.push((name, reason));
                }
            }
        }
        Ok(())
    }

    /// Decide whether and how to copy a table. `Ok(Err(reason))` skips it.
    async fn plan_table(
        &self,
        source: &SqlitePool,
        name: &str,
        declared: Option<&str>,
    ) -> Result<Result<TablePlan, String>, CrawlError> {
        if INTERNAL_TABLES.contains(&name) {
            return Ok(Err("internal table".into()));
        }
        if declared.is_some_and(|sql| sql.trim_start().to_uppercase().starts_with("CREATE VIRTUAL")) {
            return Ok(Err("virtual table".into()));
        }

        let info: Vec<ColumnInfo> =
            sqlx::query_as(&format!("PRAGMA table_info({})", quote_ident(name)))
                .fetch_all(source)
                .await
                .map_err(db_error)?;
        if info.is_empty() {
            return Ok(Err("no columns".into()));
        }

        let columns: Vec<String> = info.iter().map(|c| c.name.clone()).collect();
        let category_index = find_category_column(&columns)
            .and_then(|col| columns.iter().position(|c| *c == col));
        if category_index.is_none() && !self.include_noncategory {
            return Ok(Err("no category column detected".into()));
        }

        let declared_ddl = declared.and_then(rewrite_declared_ddl);
        let fallback_ddl = reconstruct_ddl(name, &info);
        if declared_ddl.is_none() && fallback_ddl.is_none() {
            return Ok(Err("no schema available".into()));
        }

        Ok(Ok(TablePlan {
            name: name.to_string(),
            columns,
            category_index,
            declared_ddl,
            fallback_ddl,
            has_primary_key: info.iter().any(|c| c.pk > 0),
        }))
    }

    async fn split_table(
        &self,
        source: &SqlitePool,
        plan: &TablePlan,
        registry: &mut CategoryStoreRegistry,
        schemas: &mut SchemaRegistry,
        report: &mut SplitReport,
    ) -> Result<(), CrawlError> {
        let select = format!(
            "SELECT {} FROM {}",
            plan.column_list(),
            quote_ident(&plan.name)
        );
        let replace_sql = plan.insert_sql("REPLACE");
        let ignore_sql = plan.insert_sql("IGNORE");

        let mut batches = sqlx::query(&select).fetch(source).chunks(self.batch_size);
        let mut row_index = 0usize;
        while let Some(batch) = batches.next().await {
            // One open transaction per category store, committed per batch
            let mut open: HashMap<String, (CategoryStore, Transaction<'static, Sqlite>)> =
                HashMap::new();

            for row in batch {
                let row = row.map_err(db_error)?;
                row_index += 1;
                report.rows_read += 1;
                let values = match (0..plan.columns.len())
                    .map(|i| SqlValue::read(&row, i))
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(values) => values,
                    Err(e) => {
                        tracing::warn!(
                            table = %plan.name,
                            row = row_index,
                            error = %e,
                            "Row decode failed"
                        );
                        report.failed_rows += 1;
                        continue;
                    }
                };

                let categories = match plan.category_index {
                    Some(i) => categories_or_default(values[i].as_category().as_deref()),
                    None => vec![UNCATEGORIZED.to_string()],
                };

                let mut written_slugs = HashSet::new();
                for category in categories {
                    let slug = sanitize_slug(&category);
                    if !written_slugs.insert(slug.clone()) {
                        continue;
                    }

                    if !open.contains_key(&slug) {
                        let store = registry.open(&category).await?;
                        let tx = store.pool.begin().await.map_err(db_error)?;
                        open.insert(slug.clone(), (store, tx));
                    }
                    let Some((_, tx)) = open.get_mut(&slug) else {
                        continue;
                    };

                    if !schemas.is_created(&slug, &plan.name) {
                        if let Err(reason) = create_table(&mut **tx, plan).await {
                            tracing::warn!(
                                table = %plan.name,
                                %category,
                                %reason,
                                "Could not create table in category store"
                            );
                            report.failed_rows += 1;
                            continue;
                        }
                        schemas.mark_created(&slug, &plan.name);
                    }

                    let inserted = if plan.has_primary_key {
                        match bind_values(sqlx::query(&replace_sql), &values)
                            .execute(&mut **tx)
                            .await
                        {
                            Ok(_) => Ok(()),
                            Err(_) => bind_values(sqlx::query(&ignore_sql), &values)
                                .execute(&mut **tx)
                                .await
                                .map(|_| ()),
                        }
                    } else {
                        bind_values(sqlx::query(&ignore_sql), &values)
                            .execute(&mut **tx)
                            .await
                            .map(|_| ())
                    };

                    match inserted {
                        Ok(()) => {
                            *report.rows_by_category.entry(category.clone()).or_default() += 1;
                            *report
                                .rows_by_table
                                .entry(category)
                                .or_default()
                                .entry(plan.name.clone())
                                .or_default() += 1;
                        }
                        Err(e) => {
                            tracing::warn!(table = %plan.name, %category, error = %e, "Row insert failed");
                            report.failed_rows += 1;
                        }
                    }
                }
            }

            for (slug, (_, tx)) in open {
                tx.commit().await.map_err(|e| {
                    CrawlError::DatabaseError(format!("Commit to category store {slug} failed: {e}"))
                })?;
            }
        }

        Ok(())
    }
}

/// Create the plan's table in a category store, declared schema first.
async fn create_table(conn: &mut SqliteConnection, plan: &TablePlan) -> Result<(), String> {
    let mut last_error = String::from("no schema available");
    for ddl in [&plan.declared_ddl, &plan.fallback_ddl].into_iter().flatten() {
        match sqlx::query(ddl).execute(&mut *conn).await {
            Ok(_) => return Ok(()),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(last_error)
}
