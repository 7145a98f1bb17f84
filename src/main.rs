use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

mod callback;
mod config;
mod database;
mod handlers;
mod jobs;
mod shop;
mod types;
mod util;
mod views;

use config::Config;
use handlers::{admin, balance, callback as callback_handler, command, support};
use types::ConversationState;

fn schema() -> UpdateHandler<anyhow::Error> {
  let admin_tree = dptree::filter(handlers::from_admin)
    .branch(dptree::case![ConversationState::ReceiveCategoryName].endpoint(admin::receive_category_name))
    .branch(
      dptree::case![ConversationState::ReceiveProductName { category_id }]
        .endpoint(admin::receive_product_name),
    )
    .branch(
      dptree::case![ConversationState::ReceiveProductPrice { draft }]
        .endpoint(admin::receive_product_price),
    )
    .branch(
      dptree::case![ConversationState::ReceiveProductStock { draft }]
        .endpoint(admin::receive_product_stock),
    )
    .branch(
      dptree::case![ConversationState::ReceiveProductDescription { draft }]
        .endpoint(admin::receive_product_description),
    )
    .branch(
      dptree::case![ConversationState::ReceiveNewPrice { product_id }]
        .endpoint(admin::receive_new_price),
    )
    .branch(
      dptree::case![ConversationState::ReceiveNewStock { product_id }]
        .endpoint(admin::receive_new_stock),
    )
    .branch(dptree::case![ConversationState::ReceiveContent { key }].endpoint(admin::receive_content))
    .branch(dptree::case![ConversationState::ReceiveCatalogImport].endpoint(admin::receive_catalog_import))
    .branch(
      dptree::case![ConversationState::ReceiveAdminReply { ticket_id }]
        .endpoint(support::receive_admin_reply),
    );

  let message_tree = Update::filter_message()
    .enter_dialogue::<Message, InMemStorage<ConversationState>, ConversationState>()
    .branch(dptree::filter(command::is_command).endpoint(command::receive_command))
    .branch(dptree::case![ConversationState::Idle].endpoint(command::receive_idle))
    .branch(dptree::case![ConversationState::ReceiveTopupAmount].endpoint(balance::receive_topup_amount))
    .branch(dptree::case![ConversationState::ReceiveTicketSubject].endpoint(support::receive_ticket_subject))
    .branch(
      dptree::case![ConversationState::ReceiveTicketMessage { subject }]
        .endpoint(support::receive_ticket_message),
    )
    .branch(
      dptree::case![ConversationState::ReceiveTicketReply { ticket_id }]
        .endpoint(support::receive_ticket_reply),
    )
    .branch(admin_tree);

  let callback_tree = Update::filter_callback_query()
    .enter_dialogue::<CallbackQuery, InMemStorage<ConversationState>, ConversationState>()
    .endpoint(callback_handler::receive_callback);

  dptree::entry().branch(message_tree).branch(callback_tree)
}

#[tokio::main]
async fn main() -> Result<()> {
  dotenv().ok();
  pretty_env_logger::init();

  log::info!("Starting storefront bot");

  let config = Arc::new(Config::from_env()?);
  log::debug!("Loaded config: {:?}", config);

  let db = Arc::new(database::connect(&config.database_location).await?);

  jobs::start_cart_cleanup(db.clone(), config.clone());

  let bot = Bot::from_env().parse_mode(teloxide::types::ParseMode::Html);

  log::debug!("Starting dispatcher");

  Dispatcher::builder(bot, schema())
    .dependencies(dptree::deps![
      InMemStorage::<ConversationState>::new(),
      db,
      config
    ])
    .default_handler(|update| async move {
      log::debug!("Unhandled update: {:?}", update.kind);
    })
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

  Ok(())
}
