use anyhow::Result;
use teloxide::types::ChatId;

use super::send_message::BetterSendMessage as _;
use crate::{
  database::queries,
  types::{BotType, DbConn},
  views::{self, View},
};

pub async fn categories(db: &DbConn) -> Result<View> {
  let categories = queries::list_categories(db).await?;
  Ok(views::categories_view(&categories))
}

pub async fn category(db: &DbConn, currency: &str, category_id: i64) -> Result<Option<View>> {
  let Some(category) = queries::get_category(db, category_id).await? else {
    return Ok(None);
  };

  let products = queries::list_products(db, category_id).await?;
  Ok(Some(views::category_view(&category, &products, currency)))
}

pub async fn product(
  db: &DbConn,
  currency: &str,
  user_id: i64,
  product_id: i64,
) -> Result<Option<View>> {
  let Some(product) = queries::get_product(db, product_id).await? else {
    return Ok(None);
  };

  let in_cart = queries::get_cart_quantity(db, user_id, product_id).await?;
  Ok(Some(views::product_view(&product, in_cart, currency)))
}

pub async fn send_categories(db: &DbConn, bot: &BotType, chat_id: ChatId) -> Result<()> {
  let view = categories(db).await?;
  bot.send_view(chat_id, view).await?;
  Ok(())
}
