use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use crate::types::DbConn;

pub mod entities;
pub mod export;
pub mod queries;

pub use entities::*;

pub async fn connect(database_location: &str) -> Result<DbConn> {
  log::debug!("Database location: {:?}", database_location);

  let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", database_location))?
    .create_if_missing(true)
    .foreign_keys(true);

  let pool = SqlitePoolOptions::new()
    .connect_with(options)
    .await
    .with_context(|| format!("Failed to open database at {}", database_location))?;

  migrate(&pool).await?;

  log::debug!("Successfully opened database");

  Ok(pool)
}

pub async fn migrate(db: &DbConn) -> Result<()> {
  log::debug!("Migrating database");
  sqlx::migrate!("./migrations").run(db).await?;
  Ok(())
}

#[cfg(test)]
pub async fn test_pool() -> DbConn {
  // A single connection keeps every query on the same in-memory database
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .unwrap();
  migrate(&pool).await.unwrap();
  pool
}
