use std::sync::Arc;

use anyhow::{bail, Result};
use teloxide::{
  net::Download,
  requests::Requester,
  types::{ChatId, InputFile, Message},
};

use super::send_message::BetterSendMessage as _;
use super::{rule_notice, text_of};
use crate::{
  config::Config,
  database::{
    export,
    queries::{self, CatalogError},
  },
  types::{
    BotType, ConfigType, ContentKey, ConversationState, DbConn, DialogueWithState, ProductDraft,
  },
  util::{escape_html, format_price, parse_price},
  views::{self, View},
};

const MAX_IMPORT_SIZE: u32 = 5_000_000;

pub async fn send_admin_menu(bot: &BotType, chat_id: ChatId) -> Result<()> {
  bot.send_view(chat_id, views::admin_menu_view()).await?;
  Ok(())
}

pub async fn catalog(db: &DbConn) -> Result<View> {
  let categories = queries::list_categories(db).await?;
  Ok(views::admin_categories_view(&categories))
}

pub async fn category(db: &DbConn, config: &Config, category_id: i64) -> Result<Option<View>> {
  let Some(category) = queries::get_category(db, category_id).await? else {
    return Ok(None);
  };

  let products = queries::list_products(db, category_id).await?;
  Ok(Some(views::admin_category_view(
    &category,
    &products,
    &config.currency,
  )))
}

pub async fn product(db: &DbConn, config: &Config, product_id: i64) -> Result<Option<View>> {
  let product = queries::get_product(db, product_id).await?;
  Ok(product.map(|product| views::admin_product_view(&product, &config.currency)))
}

pub async fn send_stats(db: &DbConn, config: &Config, bot: &BotType, chat_id: ChatId) -> Result<()> {
  let stats = queries::get_global_stats(db).await?;
  bot
    .send_message_easy(
      chat_id,
      format!(
        "<b>Global stats</b>\n\
        Users: <code>{}</code>\n\
        Products: <code>{}</code>\n\
        \n\
        <b>Sales</b>\n\
        Orders: <code>{}</code>\n\
        Revenue: <code>{}</code>\n\
        \n\
        <b>Waiting</b>\n\
        Active tickets: <code>{}</code>\n\
        Pending top-ups: <code>{}</code>",
        stats.total_users,
        stats.total_products,
        stats.total_orders,
        format_price(stats.total_revenue, &config.currency),
        stats.active_tickets,
        stats.pending_topups,
      ),
    )
    .await?;
  Ok(())
}

pub async fn send_pending_topups(
  db: &DbConn,
  config: &Config,
  bot: &BotType,
  chat_id: ChatId,
) -> Result<()> {
  let topups = queries::list_pending_topups(db).await?;
  if topups.is_empty() {
    bot
      .send_message_easy(chat_id, "No pending top-ups")
      .await?;
    return Ok(());
  }

  for topup in topups {
    let username = queries::get_user(db, topup.user_id)
      .await?
      .and_then(|user| user.username);
    bot
      .send_view(
        chat_id,
        views::topup_request_view(&topup, username.as_deref(), &config.currency),
      )
      .await?;
  }

  Ok(())
}

pub async fn active_tickets(db: &DbConn) -> Result<View> {
  let tickets = queries::list_active_tickets(db).await?;
  Ok(views::tickets_view(&tickets, true))
}

pub async fn send_catalog_export(db: &DbConn, bot: &BotType, chat_id: ChatId) -> Result<()> {
  bot
    .send_message_easy(chat_id, "Exporting the catalog...")
    .await?;

  let data = export::export_catalog(db).await?;

  bot
    .send_document(chat_id, InputFile::memory(data).file_name("catalog.json"))
    .await?;

  Ok(())
}

async fn extract_file(bot: &BotType, msg: &Message) -> Result<Vec<u8>> {
  let Some(doc) = msg.document() else {
    bot
      .send_message_easy(msg.chat.id, "No file sent, operation cancelled")
      .await?;
    bail!("No file sent");
  };

  if doc.file.size > MAX_IMPORT_SIZE {
    bot
      .send_message_easy(msg.chat.id, "File too large, operation cancelled")
      .await?;
    bail!("File too large");
  }

  let doc_data = bot.get_file(&doc.file.id).await?;
  let mut file_data = Vec::new();
  bot.download_file(&doc_data.path, &mut file_data).await?;

  Ok(file_data)
}

pub async fn receive_catalog_import(
  db: Arc<DbConn>,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
) -> Result<()> {
  dialogue.update(ConversationState::Idle).await?;

  let file_data = match extract_file(&bot, &msg).await {
    Ok(file_data) => file_data,
    Err(e) => {
      log::debug!("Catalog import aborted: {:?}", e);
      return Ok(());
    }
  };

  bot
    .send_message_easy(msg.chat.id, "Importing the catalog...")
    .await?;

  match export::import_catalog(&db, file_data).await {
    Ok(summary) => {
      bot
        .send_message_easy(
          msg.chat.id,
          format!(
            "Imported <code>{}</code> categories with <code>{}</code> products",
            summary.categories, summary.products
          ),
        )
        .await?;
    }
    Err(e) => {
      bot
        .send_message_easy(msg.chat.id, "Failed to import the catalog")
        .await?;
      log::error!("Failed to import catalog: {:?}", e);
    }
  }

  Ok(())
}

pub async fn start_category(bot: &BotType, dialogue: &DialogueWithState, chat_id: ChatId) -> Result<()> {
  bot
    .send_message_buttons(chat_id, "Send the name of the new category", vec!["/cancel"])
    .await?;
  dialogue
    .update(ConversationState::ReceiveCategoryName)
    .await?;
  Ok(())
}

pub async fn receive_category_name(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
) -> Result<()> {
  let Some(name) = text_of(&msg) else {
    bot
      .send_message_buttons(msg.chat.id, "Please send the name as text", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  let inserted = queries::insert_category(&db, name.clone()).await;
  match rule_notice::<CatalogError, _>(inserted)? {
    Ok(category_id) => {
      dialogue.update(ConversationState::Idle).await?;
      log::info!("Category {:?} created as {}", name, category_id);
      bot
        .send_message_easy(
          msg.chat.id,
          format!("Category <b>{}</b> created", escape_html(&name)),
        )
        .await?;
      if let Some(view) = category(&db, &config, category_id).await? {
        bot.send_view(msg.chat.id, view).await?;
      }
    }
    Err(reason) => {
      bot
        .send_message_buttons(
          msg.chat.id,
          format!("{}, send another name", escape_html(&reason)),
          vec!["/cancel"],
        )
        .await?;
    }
  }

  Ok(())
}

pub async fn start_product(
  bot: &BotType,
  dialogue: &DialogueWithState,
  chat_id: ChatId,
  category_id: i64,
) -> Result<()> {
  bot
    .send_message_buttons(chat_id, "Send the name of the new product", vec!["/cancel"])
    .await?;
  dialogue
    .update(ConversationState::ReceiveProductName { category_id })
    .await?;
  Ok(())
}

pub async fn receive_product_name(
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  category_id: i64,
) -> Result<()> {
  let Some(name) = text_of(&msg) else {
    bot
      .send_message_buttons(msg.chat.id, "Please send the name as text", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  bot
    .send_message_buttons(
      msg.chat.id,
      "Send the price, e.g. <code>9.99</code>",
      vec!["/cancel"],
    )
    .await?;

  dialogue
    .update(ConversationState::ReceiveProductPrice {
      draft: ProductDraft {
        category_id,
        name,
        ..ProductDraft::default()
      },
    })
    .await?;

  Ok(())
}

pub async fn receive_product_price(
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  draft: ProductDraft,
) -> Result<()> {
  let Some(price) = text_of(&msg).and_then(|text| parse_price(&text)) else {
    bot
      .send_message_buttons(msg.chat.id, "That is not a valid price", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  bot
    .send_message_buttons(msg.chat.id, "How many are in stock?", vec!["/cancel"])
    .await?;

  dialogue
    .update(ConversationState::ReceiveProductStock {
      draft: ProductDraft { price, ..draft },
    })
    .await?;

  Ok(())
}

pub fn parse_stock(text: &str) -> Option<i64> {
  text.trim().parse::<i64>().ok().filter(|stock| *stock >= 0)
}

pub async fn receive_product_stock(
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  draft: ProductDraft,
) -> Result<()> {
  let Some(stock) = text_of(&msg).and_then(|text| parse_stock(&text)) else {
    bot
      .send_message_buttons(msg.chat.id, "Please send a whole number", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  bot
    .send_message_buttons(
      msg.chat.id,
      "Finally, send a description, or <code>-</code> to leave it empty",
      vec!["-", "/cancel"],
    )
    .await?;

  dialogue
    .update(ConversationState::ReceiveProductDescription {
      draft: ProductDraft { stock, ..draft },
    })
    .await?;

  Ok(())
}

pub async fn receive_product_description(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  draft: ProductDraft,
) -> Result<()> {
  let Some(description) = text_of(&msg) else {
    bot
      .send_message_buttons(msg.chat.id, "Please send the description as text", vec!["-", "/cancel"])
      .await?;
    return Ok(());
  };
  let description = if description == "-" { String::new() } else { description };

  dialogue.update(ConversationState::Idle).await?;

  let product_id = queries::insert_product(&db, draft.clone(), description).await?;
  log::info!("Product {:?} created as {}", draft.name, product_id);

  bot
    .send_message_easy(msg.chat.id, format!("Product <b>{}</b> created", escape_html(&draft.name)))
    .await?;
  if let Some(view) = product(&db, &config, product_id).await? {
    bot.send_view(msg.chat.id, view).await?;
  }

  Ok(())
}

pub async fn start_price_edit(
  bot: &BotType,
  dialogue: &DialogueWithState,
  chat_id: ChatId,
  product_id: i64,
) -> Result<()> {
  bot
    .send_message_buttons(chat_id, "Send the new price", vec!["/cancel"])
    .await?;
  dialogue
    .update(ConversationState::ReceiveNewPrice { product_id })
    .await?;
  Ok(())
}

pub async fn receive_new_price(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  product_id: i64,
) -> Result<()> {
  let Some(price) = text_of(&msg).and_then(|text| parse_price(&text)) else {
    bot
      .send_message_buttons(msg.chat.id, "That is not a valid price", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  dialogue.update(ConversationState::Idle).await?;

  if !queries::update_product_price(&db, product_id, price).await? {
    bot
      .send_message_easy(msg.chat.id, "That product no longer exists")
      .await?;
    return Ok(());
  }

  if let Some(view) = product(&db, &config, product_id).await? {
    bot.send_view(msg.chat.id, view).await?;
  }

  Ok(())
}

pub async fn start_stock_edit(
  bot: &BotType,
  dialogue: &DialogueWithState,
  chat_id: ChatId,
  product_id: i64,
) -> Result<()> {
  bot
    .send_message_buttons(
      chat_id,
      "Send the new stock. Items already reserved in carts are not counted.",
      vec!["/cancel"],
    )
    .await?;
  dialogue
    .update(ConversationState::ReceiveNewStock { product_id })
    .await?;
  Ok(())
}

pub async fn receive_new_stock(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  product_id: i64,
) -> Result<()> {
  let Some(stock) = text_of(&msg).and_then(|text| parse_stock(&text)) else {
    bot
      .send_message_buttons(msg.chat.id, "Please send a whole number", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  dialogue.update(ConversationState::Idle).await?;

  if !queries::update_product_stock(&db, product_id, stock).await? {
    bot
      .send_message_easy(msg.chat.id, "That product no longer exists")
      .await?;
    return Ok(());
  }

  if let Some(view) = product(&db, &config, product_id).await? {
    bot.send_view(msg.chat.id, view).await?;
  }

  Ok(())
}

pub async fn start_content_edit(
  db: &DbConn,
  bot: &BotType,
  dialogue: &DialogueWithState,
  chat_id: ChatId,
  key: ContentKey,
) -> Result<()> {
  let current = queries::get_content(db, key).await?;
  bot
    .send_message_buttons(
      chat_id,
      format!(
        "Current <b>{}</b> text:\n{}\n\nSend the replacement",
        key.as_str(),
        escape_html(&current)
      ),
      vec!["/cancel"],
    )
    .await?;
  dialogue
    .update(ConversationState::ReceiveContent { key })
    .await?;
  Ok(())
}

pub async fn receive_content(
  db: Arc<DbConn>,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  key: ContentKey,
) -> Result<()> {
  let Some(body) = text_of(&msg) else {
    bot
      .send_message_buttons(msg.chat.id, "Please send the text", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  dialogue.update(ConversationState::Idle).await?;
  queries::set_content(&db, key, body).await?;

  log::info!("Content {:?} updated", key);

  bot
    .send_message_easy(msg.chat.id, format!("The <b>{}</b> text was updated", key.as_str()))
    .await?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stock_must_be_whole_and_positive() {
    assert_eq!(parse_stock("12"), Some(12));
    assert_eq!(parse_stock(" 0 "), Some(0));
    assert_eq!(parse_stock("-1"), None);
    assert_eq!(parse_stock("1.5"), None);
  }
}
