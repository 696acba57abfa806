//! Database sink
//!
//! Inserts records into a `crawl_records` table. Works against any database
//! the `sqlx` Any driver speaks (PostgreSQL in production, SQLite in tests);
//! columns are kept to portable types for that reason.

use async_trait::async_trait;
use harvest_core::domain::record::CrawlRecord;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::time::Duration;

use crate::error::SinkError;
use crate::sink::StorageSink;

const SINK_NAME: &str = "database";

pub struct DbSink {
    pool: AnyPool,
}

impl DbSink {
    /// Connects to `database_url` and creates the table if needed
    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(db_error)?;

        Self::with_pool(pool).await
    }

    /// Wraps an existing pool and creates the table if needed
    pub async fn with_pool(pool: AnyPool) -> Result<Self, SinkError> {
        let sink = Self { pool };
        sink.run_migrations().await?;
        Ok(sink)
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), SinkError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_records (
                id VARCHAR(36) PRIMARY KEY,
                site_id VARCHAR(255) NOT NULL,
                category VARCHAR(50),
                url TEXT NOT NULL,
                title TEXT,
                content TEXT NOT NULL,
                fetched_at VARCHAR(40) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_crawl_records_site_id ON crawl_records(site_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

fn db_error(source: sqlx::Error) -> SinkError {
    SinkError::Database {
        sink: SINK_NAME.to_string(),
        source,
    }
}

#[async_trait]
impl StorageSink for DbSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn write(&self, record: &CrawlRecord) -> Result<(), SinkError> {
        sqlx::query(
            r#"
            INSERT INTO crawl_records (id, site_id, category, url, title, content, fetched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.site_id.clone())
        .bind(record.category.map(|c| c.as_str().to_string()))
        .bind(record.url.clone())
        .bind(record.title.clone())
        .bind(record.content.clone())
        .bind(record.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}
