use std::time::Duration;

use anyhow::Result;
use tokio::{task::JoinHandle, time::interval};

use crate::{
  database::queries,
  types::{ConfigType, DbConn, DbType},
  util,
};

/// Releases the stock of abandoned carts. Runs until the runtime shuts down.
pub fn start_cart_cleanup(db: DbType, config: ConfigType) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = interval(Duration::from_secs(config.cleanup_interval_seconds));

    log::info!(
      "Cart cleanup started (interval: {}s, ttl: {}m)",
      config.cleanup_interval_seconds,
      config.cart_ttl_minutes,
    );

    loop {
      ticker.tick().await;

      if let Err(e) = run_cart_cleanup(&db, config.cart_ttl_ms(), util::get_unix()).await {
        log::error!("Cart cleanup failed: {:?}", e);
      }
    }
  })
}

pub async fn run_cart_cleanup(db: &DbConn, ttl_ms: i64, now: i64) -> Result<u64> {
  let released = queries::release_expired_carts(db, now, ttl_ms).await?;
  if released > 0 {
    log::info!("Released {} expired cart lines", released);
  }
  Ok(released)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::{
    queries::{change_cart_quantity, ensure_user, get_product, seed_product},
    test_pool,
  };

  #[tokio::test]
  async fn cleanup_returns_stock() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 100, 4).await;
    change_cart_quantity(&db, 1, product_id, 3, 10, 1_000).await.unwrap();

    assert_eq!(run_cart_cleanup(&db, 500, 1_500).await.unwrap(), 0);
    assert_eq!(run_cart_cleanup(&db, 500, 1_501).await.unwrap(), 1);

    let product = get_product(&db, product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 4);
  }
}
