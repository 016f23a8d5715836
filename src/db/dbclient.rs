use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

const SCHEMA: &str = include_str!("schema.sql");

pub struct DBClient {
    pool: PgPool,
}

impl DBClient {
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        Ok(Self {
            pool,
        })
    }

    pub fn conn(&self) -> &PgPool {
        &self.pool
    }

    /// Creates any missing tables.
    pub async fn prepare(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;

        Ok(())
    }
}
