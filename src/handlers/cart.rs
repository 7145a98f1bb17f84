use anyhow::Result;
use teloxide::types::ChatId;

use super::send_message::BetterSendMessage as _;
use crate::{
  config::Config,
  database::queries,
  shop::{self, CartError, QuantityChange},
  types::{BotType, DbConn},
  util::{self, format_price},
  views::{self, View},
};

fn describe_cart_error(error: &CartError, currency: &str) -> String {
  match error {
    CartError::InsufficientBalance { missing } => format!(
      "Not enough balance, you need {} more. Use /topup to add funds",
      format_price(*missing, currency)
    ),
    other => other.to_string(),
  }
}

pub async fn cart(db: &DbConn, config: &Config, user_id: i64) -> Result<View> {
  let now = util::get_unix();
  let mut lines = queries::get_cart(db, user_id).await?;
  let mut reserved_at = lines.iter().map(|line| line.reserved_at).max().unwrap_or(0);

  // The cleanup job may not have run yet
  if !lines.is_empty() && shop::is_expired(reserved_at, now, config.cart_ttl_ms()) {
    queries::release_expired_carts(db, now, config.cart_ttl_ms()).await?;
    lines = queries::get_cart(db, user_id).await?;
    reserved_at = lines.iter().map(|line| line.reserved_at).max().unwrap_or(0);
  }

  let balance = queries::get_balance(db, user_id).await?;
  let expires_at = reserved_at + config.cart_ttl_ms();

  Ok(views::cart_view(&lines, balance, expires_at, &config.currency))
}

pub async fn send_cart(
  db: &DbConn,
  config: &Config,
  bot: &BotType,
  chat_id: ChatId,
  user_id: i64,
) -> Result<()> {
  let view = cart(db, config, user_id).await?;
  bot.send_view(chat_id, view).await?;
  Ok(())
}

/// Applies a quantity change and returns a short notice for the user.
pub async fn change_quantity(
  db: &DbConn,
  config: &Config,
  user_id: i64,
  product_id: i64,
  delta: i64,
) -> Result<String> {
  let result = queries::change_cart_quantity(
    db,
    user_id,
    product_id,
    delta,
    config.cart_max_quantity,
    util::get_unix(),
  )
  .await;

  match result {
    Ok(QuantityChange::Set(quantity)) => Ok(format!("{} in your cart", quantity)),
    Ok(QuantityChange::Remove) => Ok("Removed from your cart".to_string()),
    Err(e) => match e.downcast::<CartError>() {
      Ok(cart_error) => Ok(describe_cart_error(&cart_error, &config.currency)),
      Err(e) => Err(e),
    },
  }
}

pub async fn remove_line(db: &DbConn, user_id: i64, product_id: i64) -> Result<String> {
  if queries::remove_cart_line(db, user_id, product_id).await? {
    Ok("Removed from your cart".to_string())
  } else {
    Ok("That item is no longer in your cart".to_string())
  }
}

pub async fn clear(db: &DbConn, user_id: i64) -> Result<String> {
  let removed = queries::clear_cart(db, user_id).await?;
  log::debug!("Cleared {} cart lines for {:?}", removed, user_id);
  Ok("Your cart is now empty".to_string())
}

/// Returns whether an order was placed and the message to show.
pub async fn checkout(db: &DbConn, config: &Config, user_id: i64) -> Result<(bool, String)> {
  match queries::checkout(db, user_id, util::get_unix()).await {
    Ok(result) => Ok((
      true,
      format!(
        "<b>Order #{} placed!</b>\nPaid: <code>{}</code>\nRemaining balance: <code>{}</code>",
        result.order_id,
        format_price(result.total, &config.currency),
        format_price(result.balance, &config.currency)
      ),
    )),
    Err(e) => match e.downcast::<CartError>() {
      Ok(cart_error) => Ok((false, describe_cart_error(&cart_error, &config.currency))),
      Err(e) => Err(e),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::{
    queries::{credit_balance, ensure_user, seed_product},
    test_pool,
  };

  #[tokio::test]
  async fn notices_follow_the_rules() {
    let db = test_pool().await;
    let config = Config {
      cart_max_quantity: 2,
      ..Config::default()
    };
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 100, 5).await;

    assert_eq!(
      change_quantity(&db, &config, 1, product_id, 1).await.unwrap(),
      "1 in your cart"
    );
    change_quantity(&db, &config, 1, product_id, 1).await.unwrap();
    assert_eq!(
      change_quantity(&db, &config, 1, product_id, 1).await.unwrap(),
      "You can't have more than 2 of this item in your cart"
    );
    assert!(change_quantity(&db, &config, 1, 404, 1).await.is_err());
  }

  #[tokio::test]
  async fn stale_cart_is_released_on_view() {
    let db = test_pool().await;
    let config = Config::default();
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 100, 5).await;
    queries::change_cart_quantity(&db, 1, product_id, 2, 10, 1_000)
      .await
      .unwrap();

    let view = cart(&db, &config, 1).await.unwrap();
    assert!(view.text.starts_with("Your cart is empty"));
    assert_eq!(queries::get_product(&db, product_id).await.unwrap().unwrap().stock, 5);
  }

  #[tokio::test]
  async fn checkout_reports_missing_funds() {
    let db = test_pool().await;
    let config = Config::default();
    ensure_user(&db, 1, None).await.unwrap();
    let product_id = seed_product(&db, 1_000, 5).await;
    change_quantity(&db, &config, 1, product_id, 1).await.unwrap();
    credit_balance(&db, 1, 250).await.unwrap();

    let (placed, text) = checkout(&db, &config, 1).await.unwrap();
    assert!(!placed);
    assert!(text.contains("7.50 USD"));

    credit_balance(&db, 1, 750).await.unwrap();
    let (placed, text) = checkout(&db, &config, 1).await.unwrap();
    assert!(placed);
    assert!(text.contains("Remaining balance: <code>0.00 USD</code>"));
  }
}
