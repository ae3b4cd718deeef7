//! PostgreSQL connection pool.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::PersistenceConfig;

/// Thin wrapper over the sqlx pool that keeps the (masked) URL for logging.
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
    database_url: String,
}

impl PostgresPool {
    /// Connect a new pool from configuration.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds as u64))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds as u64))
            .connect(&config.url)
            .await?;

        let this = Self {
            pool,
            database_url: config.url.clone(),
        };

        tracing::info!(
            pool_size = config.pool_size,
            url = %this.database_url_masked(),
            "PostgreSQL connection pool created"
        );

        Ok(this)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the database URL (masked for logging).
    pub fn database_url_masked(&self) -> String {
        mask_url(&self.database_url)
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL connection pool closed");
    }
}

fn mask_url(url: &str) -> String {
    let authority_start = url.find("://").map(|p| p + 3).unwrap_or(0);
    if let Some(at_pos) = url[authority_start..].find('@').map(|p| p + authority_start) {
        if let Some(colon_pos) = url[authority_start..at_pos].rfind(':') {
            let colon_pos = colon_pos + authority_start;
            return format!("{}***{}", &url[..colon_pos + 1], &url[at_pos..]);
        }
    }
    url.to_string()
}
