use anyhow::Result;

use crate::{
  database::{queries::GlobalStats, TicketStatus, TopupStatus},
  types::DbConn,
};

pub async fn get_global_stats(db: &DbConn) -> Result<GlobalStats> {
  log::debug!("get_global_stats");

  let (total_users, total_products): (i64, i64) = sqlx::query_as(
    "SELECT \
      (SELECT COUNT(*) FROM users) AS total_users, \
      (SELECT COUNT(*) FROM products) AS total_products",
  )
  .fetch_one(db)
  .await?;

  let (total_orders, total_revenue): (i64, i64) =
    sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(total), 0) FROM orders")
      .fetch_one(db)
      .await?;

  let (active_tickets, pending_topups): (i64, i64) = sqlx::query_as(
    "SELECT \
      (SELECT COUNT(*) FROM tickets WHERE status != $1) AS active_tickets, \
      (SELECT COUNT(*) FROM topups WHERE status = $2) AS pending_topups",
  )
  .bind(TicketStatus::Closed)
  .bind(TopupStatus::Pending)
  .fetch_one(db)
  .await?;

  let result = GlobalStats {
    total_users,
    total_products,
    total_orders,
    total_revenue,
    active_tickets,
    pending_topups,
  };

  log::debug!("get_global_stats result: {:?}", result);

  Ok(result)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::{
    queries::{
      change_cart_quantity, checkout, create_topup, credit_balance, ensure_user, seed_product,
    },
    test_pool,
  };

  #[tokio::test]
  async fn empty_database() {
    let db = test_pool().await;
    let stats = get_global_stats(&db).await.unwrap();
    assert_eq!(stats.total_users, 0);
    assert_eq!(stats.total_revenue, 0);
  }

  #[tokio::test]
  async fn counts_everything() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    credit_balance(&db, 1, 1_000).await.unwrap();
    let product_id = seed_product(&db, 300, 5).await;
    change_cart_quantity(&db, 1, product_id, 2, 10, 1_000).await.unwrap();
    checkout(&db, 1, 1_000).await.unwrap();
    create_topup(&db, 1, 500, 2_000).await.unwrap();

    let stats = get_global_stats(&db).await.unwrap();
    assert_eq!(
      stats,
      GlobalStats {
        total_users: 1,
        total_products: 1,
        total_orders: 1,
        total_revenue: 600,
        active_tickets: 0,
        pending_topups: 1,
      }
    );
  }
}
