use anyhow::Result;

use crate::{database::Order, types::DbConn};

pub async fn list_orders(db: &DbConn, user_id: i64, limit: i64) -> Result<Vec<Order>> {
  log::debug!("list_orders for user_id: {:?}", user_id);

  let result: Vec<Order> = sqlx::query_as(
    "SELECT * FROM orders WHERE user_id = $1 \
      ORDER BY created_at DESC, order_id DESC LIMIT $2",
  )
  .bind(user_id)
  .bind(limit)
  .fetch_all(db)
  .await?;

  log::debug!("list_orders result: {:?}", result);

  Ok(result)
}

pub async fn get_order_items(db: &DbConn, order_id: i64) -> Result<Vec<(String, i64, i64)>> {
  let result: Vec<(String, i64, i64)> = sqlx::query_as(
    "SELECT product_name, price, quantity FROM order_items WHERE order_id = $1",
  )
  .bind(order_id)
  .fetch_all(db)
  .await?;

  Ok(result)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::{
    queries::{change_cart_quantity, checkout, credit_balance, ensure_user, seed_product},
    test_pool,
  };

  #[tokio::test]
  async fn lists_newest_first() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    credit_balance(&db, 1, 10_000).await.unwrap();
    let product_id = seed_product(&db, 100, 10).await;

    change_cart_quantity(&db, 1, product_id, 1, 10, 1_000).await.unwrap();
    let first = checkout(&db, 1, 1_000).await.unwrap();
    change_cart_quantity(&db, 1, product_id, 2, 10, 2_000).await.unwrap();
    let second = checkout(&db, 1, 2_000).await.unwrap();

    let orders = list_orders(&db, 1, 10).await.unwrap();
    assert_eq!(
      orders.iter().map(|o| o.order_id).collect::<Vec<_>>(),
      vec![second.order_id, first.order_id]
    );

    let items = get_order_items(&db, second.order_id).await.unwrap();
    assert_eq!(items, vec![("Product 100".to_string(), 100, 2)]);
  }
}
