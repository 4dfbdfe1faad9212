use log::{info, warn};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    PaginatorTrait, Select, Statement,
};
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::config::AppConfig;
use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: u64 = 30;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// `page` is 1-based; out-of-range sizes are clamped.
pub async fn fetch_page<'db, C, E>(
    db: &'db C,
    select: Select<E>,
    page: Option<u64>,
    size: Option<u64>,
) -> Result<Page<E::Model>, AppError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Sync + 'db,
{
    let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    let paginator = select.paginate(db, size);
    let counts = paginator
        .num_items_and_pages()
        .await
        .map_err(|e| AppError::db("fetch_page count", e))?;
    let items = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| AppError::db("fetch_page", e))?;
    Ok(Page {
        items,
        total: counts.number_of_items,
        total_pages: counts.number_of_pages,
    })
}

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config.database_url();
    let db = connect(&url).await?;
    init_sqlite_schema(&db).await?;
    Ok(db)
}

async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url.to_string());
    if url.contains(":memory:") {
        // every pooled connection would otherwise get its own empty database
        opt.max_connections(1).min_connections(1);
    } else if url.starts_with("sqlite:") {
        ensure_sqlite_path(url);
    }
    opt.sqlx_logging(false);
    Database::connect(opt).await
}

fn ensure_sqlite_path(raw: &str) {
    let path = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("sqlite:"))
        .unwrap_or(raw);
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path);
}

async fn init_sqlite_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    if backend != DbBackend::Sqlite {
        return Ok(());
    }
    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='users' LIMIT 1",
    );
    let exists = db.query_one(exists_stmt).await?.is_some();
    if exists {
        return Ok(());
    }

    info!("bootstrapping sqlite schema");
    let sql = include_str!("../schema-sqlite.sql");
    for stmt in split_sql(sql) {
        if let Err(e) = db.execute(Statement::from_string(backend, stmt.clone())).await {
            warn!("schema statement failed: {} ({})", e, stmt);
            return Err(e);
        }
    }
    Ok(())
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
pub async fn test_db() -> DatabaseConnection {
    connect_db(&AppConfig::for_test())
        .await
        .expect("in-memory sqlite")
}
