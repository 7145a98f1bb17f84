use anyhow::{bail, Result};
use sqlx::QueryBuilder;

use crate::{
  database::{queries::CheckoutResult, CartLine},
  shop::{self, CartError, QuantityChange},
  types::DbConn,
};

pub async fn get_cart(db: &DbConn, user_id: i64) -> Result<Vec<CartLine>> {
  log::debug!("get_cart for user_id: {:?}", user_id);

  let result: Vec<CartLine> = sqlx::query_as(
    "SELECT cart_items.product_id, products.name, products.price, cart_items.quantity, cart_items.reserved_at \
      FROM cart_items \
      JOIN products ON products.product_id = cart_items.product_id \
      WHERE cart_items.user_id = $1 \
      ORDER BY products.name",
  )
  .bind(user_id)
  .fetch_all(db)
  .await?;

  log::debug!("get_cart result: {:?}", result);

  Ok(result)
}

pub async fn get_cart_quantity(db: &DbConn, user_id: i64, product_id: i64) -> Result<i64> {
  let result: Option<i64> = sqlx::query_scalar(
    "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2",
  )
  .bind(user_id)
  .bind(product_id)
  .fetch_optional(db)
  .await?;

  Ok(result.unwrap_or(0))
}

/// Adds `delta` units (negative to take away) of a product to a user's cart.
/// Stock moves between the product and the cart line, so whatever sits in a
/// cart is reserved until checkout, removal or expiry. Any change refreshes
/// the reservation time of the whole cart.
///
/// Rule violations are returned as a [`CartError`] inside the error.
pub async fn change_cart_quantity(
  db: &DbConn,
  user_id: i64,
  product_id: i64,
  delta: i64,
  max_quantity: i64,
  now: i64,
) -> Result<QuantityChange> {
  log::debug!(
    "change_cart_quantity: {:?} of product_id: {:?} for user_id: {:?}",
    delta,
    product_id,
    user_id
  );

  let mut transaction = db.begin().await?;

  let available: Option<i64> =
    sqlx::query_scalar("SELECT stock FROM products WHERE product_id = $1")
      .bind(product_id)
      .fetch_optional(transaction.as_mut())
      .await?;
  let Some(available) = available else {
    bail!("Product {} does not exist", product_id);
  };

  let current: i64 = sqlx::query_scalar(
    "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2",
  )
  .bind(user_id)
  .bind(product_id)
  .fetch_optional(transaction.as_mut())
  .await?
  .unwrap_or(0);

  let change = shop::adjust_quantity(current, delta, available, max_quantity)?;

  let stock_delta = match change {
    QuantityChange::Set(quantity) => {
      sqlx::query(
        "INSERT INTO cart_items (user_id, product_id, quantity, reserved_at) \
          VALUES ($1, $2, $3, $4) \
          ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = $3",
      )
      .bind(user_id)
      .bind(product_id)
      .bind(quantity)
      .bind(now)
      .execute(transaction.as_mut())
      .await?;

      current - quantity
    }
    QuantityChange::Remove => {
      sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(transaction.as_mut())
        .await?;

      current
    }
  };

  sqlx::query("UPDATE products SET stock = stock + $1 WHERE product_id = $2")
    .bind(stock_delta)
    .bind(product_id)
    .execute(transaction.as_mut())
    .await?;

  sqlx::query("UPDATE cart_items SET reserved_at = $1 WHERE user_id = $2")
    .bind(now)
    .bind(user_id)
    .execute(transaction.as_mut())
    .await?;

  transaction.commit().await?;

  log::debug!("change_cart_quantity result: {:?}", change);

  Ok(change)
}

pub async fn remove_cart_line(db: &DbConn, user_id: i64, product_id: i64) -> Result<bool> {
  log::debug!(
    "remove_cart_line: product_id: {:?} for user_id: {:?}",
    product_id,
    user_id
  );

  let mut transaction = db.begin().await?;

  let quantity: Option<i64> = sqlx::query_scalar(
    "DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2 RETURNING quantity",
  )
  .bind(user_id)
  .bind(product_id)
  .fetch_optional(transaction.as_mut())
  .await?;

  if let Some(quantity) = quantity {
    sqlx::query("UPDATE products SET stock = stock + $1 WHERE product_id = $2")
      .bind(quantity)
      .bind(product_id)
      .execute(transaction.as_mut())
      .await?;
  }

  transaction.commit().await?;

  Ok(quantity.is_some())
}

pub async fn clear_cart(db: &DbConn, user_id: i64) -> Result<u64> {
  log::debug!("clear_cart for user_id: {:?}", user_id);

  let mut transaction = db.begin().await?;

  sqlx::query(
    "UPDATE products SET stock = stock + \
      (SELECT quantity FROM cart_items WHERE cart_items.product_id = products.product_id AND cart_items.user_id = $1) \
      WHERE product_id IN (SELECT product_id FROM cart_items WHERE user_id = $1)",
  )
  .bind(user_id)
  .execute(transaction.as_mut())
  .await?;

  let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
    .bind(user_id)
    .execute(transaction.as_mut())
    .await?;

  transaction.commit().await?;

  Ok(result.rows_affected())
}

/// Returns the stock of every cart line whose reservation is older than
/// `ttl_ms` and drops those lines. Returns how many lines were released.
pub async fn release_expired_carts(db: &DbConn, now: i64, ttl_ms: i64) -> Result<u64> {
  let cutoff = now - ttl_ms;

  log::debug!("release_expired_carts older than {:?}", cutoff);

  let mut transaction = db.begin().await?;

  sqlx::query(
    "UPDATE products SET stock = stock + \
      (SELECT SUM(quantity) FROM cart_items WHERE cart_items.product_id = products.product_id AND cart_items.reserved_at < $1) \
      WHERE product_id IN (SELECT product_id FROM cart_items WHERE reserved_at < $1)",
  )
  .bind(cutoff)
  .execute(transaction.as_mut())
  .await?;

  let result = sqlx::query("DELETE FROM cart_items WHERE reserved_at < $1")
    .bind(cutoff)
    .execute(transaction.as_mut())
    .await?;

  transaction.commit().await?;

  Ok(result.rows_affected())
}

/// Turns the cart into an order paid from the user's balance. Reserved stock
/// stays consumed.
pub async fn checkout(db: &DbConn, user_id: i64, now: i64) -> Result<CheckoutResult> {
  log::debug!("checkout for user_id: {:?}", user_id);

  let mut transaction = db.begin().await?;

  let lines: Vec<CartLine> = sqlx::query_as(
    "SELECT cart_items.product_id, products.name, products.price, cart_items.quantity, cart_items.reserved_at \
      FROM cart_items \
      JOIN products ON products.product_id = cart_items.product_id \
      WHERE cart_items.user_id = $1",
  )
  .bind(user_id)
  .fetch_all(transaction.as_mut())
  .await?;

  if lines.is_empty() {
    return Err(CartError::Empty.into());
  }

  let total = shop::cart_total(lines.iter().map(|line| (line.price, line.quantity)));

  let balance: i64 = sqlx::query_scalar("SELECT balance FROM users WHERE user_id = $1")
    .bind(user_id)
    .fetch_optional(transaction.as_mut())
    .await?
    .unwrap_or(0);

  if balance < total {
    return Err(
      CartError::InsufficientBalance {
        missing: total - balance,
      }
      .into(),
    );
  }

  let order_id: i64 = sqlx::query_scalar(
    "INSERT INTO orders (user_id, total, created_at) VALUES ($1, $2, $3) RETURNING order_id",
  )
  .bind(user_id)
  .bind(total)
  .bind(now)
  .fetch_one(transaction.as_mut())
  .await?;

  let mut insert_items_query =
    QueryBuilder::new("INSERT INTO order_items (order_id, product_name, price, quantity) ");
  insert_items_query.push_values(&lines, |mut b, line| {
    b.push_bind(order_id);
    b.push_bind(line.name.clone());
    b.push_bind(line.price);
    b.push_bind(line.quantity);
  });
  insert_items_query
    .build()
    .execute(transaction.as_mut())
    .await?;

  let balance: i64 = sqlx::query_scalar(
    "UPDATE users SET balance = balance - $1 WHERE user_id = $2 RETURNING balance",
  )
  .bind(total)
  .bind(user_id)
  .fetch_one(transaction.as_mut())
  .await?;

  sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
    .bind(user_id)
    .execute(transaction.as_mut())
    .await?;

  transaction.commit().await?;

  log::info!(
    "Order {} placed by {} for {} ({} lines)",
    order_id,
    user_id,
    total,
    lines.len()
  );

  Ok(CheckoutResult {
    order_id,
    total,
    balance,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::{
    queries::{credit_balance, ensure_user, get_product, seed_product},
    test_pool,
  };

  async fn stock_of(db: &DbConn, product_id: i64) -> i64 {
    get_product(db, product_id).await.unwrap().unwrap().stock
  }

  #[tokio::test]
  async fn adding_reserves_stock() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 300, 5).await;

    change_cart_quantity(&db, 1, product_id, 2, 10, 1_000).await.unwrap();
    assert_eq!(stock_of(&db, product_id).await, 3);
    assert_eq!(get_cart_quantity(&db, 1, product_id).await.unwrap(), 2);

    change_cart_quantity(&db, 1, product_id, -1, 10, 2_000).await.unwrap();
    assert_eq!(stock_of(&db, product_id).await, 4);
    assert_eq!(get_cart_quantity(&db, 1, product_id).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn cannot_reserve_more_than_stock() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 300, 1).await;

    change_cart_quantity(&db, 1, product_id, 1, 10, 1_000).await.unwrap();
    let err = change_cart_quantity(&db, 1, product_id, 1, 10, 1_000)
      .await
      .unwrap_err();
    assert_eq!(
      err.downcast_ref::<CartError>(),
      Some(&CartError::OutOfStock { available: 0 })
    );
    assert_eq!(get_cart_quantity(&db, 1, product_id).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn decrement_to_zero_returns_stock() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 300, 2).await;

    change_cart_quantity(&db, 1, product_id, 2, 10, 1_000).await.unwrap();
    let change = change_cart_quantity(&db, 1, product_id, -2, 10, 1_000)
      .await
      .unwrap();

    assert_eq!(change, QuantityChange::Remove);
    assert_eq!(stock_of(&db, product_id).await, 2);
    assert!(get_cart(&db, 1).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn expired_lines_are_released() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    ensure_user(&db, 2, None).await.unwrap();
    let product_id = seed_product(&db, 300, 10).await;

    change_cart_quantity(&db, 1, product_id, 3, 10, 1_000).await.unwrap();
    change_cart_quantity(&db, 2, product_id, 4, 10, 5_000).await.unwrap();
    assert_eq!(stock_of(&db, product_id).await, 3);

    let released = release_expired_carts(&db, 6_000, 4_000).await.unwrap();
    assert_eq!(released, 1);
    assert_eq!(stock_of(&db, product_id).await, 6);
    assert!(get_cart(&db, 1).await.unwrap().is_empty());
    assert_eq!(get_cart(&db, 2).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn activity_keeps_whole_cart_alive() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let first = seed_product(&db, 100, 10).await;
    let second = seed_product(&db, 200, 10).await;

    change_cart_quantity(&db, 1, first, 1, 10, 1_000).await.unwrap();
    change_cart_quantity(&db, 1, second, 1, 10, 9_000).await.unwrap();

    assert_eq!(release_expired_carts(&db, 10_000, 5_000).await.unwrap(), 0);
    assert_eq!(get_cart(&db, 1).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn clearing_returns_everything() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let first = seed_product(&db, 100, 4).await;
    let second = seed_product(&db, 200, 4).await;

    change_cart_quantity(&db, 1, first, 2, 10, 1_000).await.unwrap();
    change_cart_quantity(&db, 1, second, 3, 10, 1_000).await.unwrap();

    assert_eq!(clear_cart(&db, 1).await.unwrap(), 2);
    assert_eq!(stock_of(&db, first).await, 4);
    assert_eq!(stock_of(&db, second).await, 4);
  }

  #[tokio::test]
  async fn removing_a_line_returns_its_stock() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 100, 4).await;

    change_cart_quantity(&db, 1, product_id, 3, 10, 1_000).await.unwrap();
    assert!(remove_cart_line(&db, 1, product_id).await.unwrap());
    assert!(!remove_cart_line(&db, 1, product_id).await.unwrap());
    assert_eq!(stock_of(&db, product_id).await, 4);
  }

  #[tokio::test]
  async fn checkout_requires_balance() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 250, 5).await;

    change_cart_quantity(&db, 1, product_id, 2, 10, 1_000).await.unwrap();
    credit_balance(&db, 1, 400).await.unwrap();

    let err = checkout(&db, 1, 2_000).await.unwrap_err();
    assert_eq!(
      err.downcast_ref::<CartError>(),
      Some(&CartError::InsufficientBalance { missing: 100 })
    );

    credit_balance(&db, 1, 100).await.unwrap();
    let result = checkout(&db, 1, 3_000).await.unwrap();
    assert_eq!(result.total, 500);
    assert_eq!(result.balance, 0);
    assert!(get_cart(&db, 1).await.unwrap().is_empty());
    assert_eq!(stock_of(&db, product_id).await, 3);
  }

  #[tokio::test]
  async fn empty_cart_cannot_checkout() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();

    let err = checkout(&db, 1, 1_000).await.unwrap_err();
    assert_eq!(err.downcast_ref::<CartError>(), Some(&CartError::Empty));
  }
}
