use anyhow::{anyhow, Context, Result};
use deadpool::Runtime;
use diesel::{Connection, PgConnection};
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = deadpool::managed::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type DbConnection = deadpool::managed::Object<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database manager for the indexer
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create the connection pool, check connectivity and apply pending migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);

        let pool = DbPool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .context("Failed to build database pool")?;

        let db = Self { pool };
        db.initialize(config.url.clone()).await?;

        Ok(db)
    }

    async fn initialize(&self, url: String) -> Result<()> {
        let _conn = self.get_connection().await?;
        info!("Successfully connected to the database");

        tokio::task::spawn_blocking(move || run_migrations(&url)).await??;

        Ok(())
    }

    /// Get a database connection from the pool
    pub async fn get_connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .await
            .map_err(|e| anyhow!("Failed to get database connection: {}", e))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn run_migrations(url: &str) -> Result<()> {
    let mut conn = PgConnection::establish(url)?;

    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Failed to apply migrations: {}", e))?;
    info!("Database migrations applied successfully");

    Ok(())
}
