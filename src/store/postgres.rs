//! PostgreSQL implementation of the view store.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use super::{Collection, StoreError, ViewStore};

/// Connection settings for [`PostgresViewStore::connect`].
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Minimum idle connections.
    pub min_connections: u32,
    /// Timeout for acquiring a connection.
    pub connect_timeout: Duration,
}

/// PostgreSQL-backed [`ViewStore`] using `sqlx::PgPool`.
///
/// Each collection is one row of `view_collections`; a batch is written
/// in a single transaction.
#[derive(Debug, Clone)]
pub struct PostgresViewStore {
    pool: PgPool,
}

impl PostgresViewStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects, then applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the database is unreachable or a
    /// migration fails.
    pub async fn connect(settings: &PostgresSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(&settings.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::info!("postgres view store connected");
        Ok(Self::new(pool))
    }
}

#[async_trait::async_trait]
impl ViewStore for PostgresViewStore {
    async fn load(&self, collection: Collection) -> Result<Option<serde_json::Value>, StoreError> {
        let row = sqlx::query_scalar::<_, Json<serde_json::Value>>(
            "SELECT body FROM view_collections WHERE name = $1",
        )
        .bind(collection.name())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(body)| body))
    }

    async fn commit(&self, batch: Vec<(Collection, serde_json::Value)>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (collection, body) in batch {
            sqlx::query(
                "INSERT INTO view_collections (name, generation, body, updated_at) \
                 VALUES ($1, 1, $2, now()) \
                 ON CONFLICT (name) DO UPDATE \
                 SET generation = view_collections.generation + 1, \
                     body = EXCLUDED.body, \
                     updated_at = now()",
            )
            .bind(collection.name())
            .bind(Json(body))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
