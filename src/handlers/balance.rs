use std::sync::Arc;

use anyhow::Result;
use teloxide::types::{ChatId, Message};

use super::send_message::BetterSendMessage as _;
use super::{notify_admins, notify_user, register, rule_notice, sender, text_of};
use crate::{
  config::Config,
  database::{
    queries::{self, TopupError},
    TopupStatus,
  },
  types::{BotType, ConfigType, ConversationState, DbConn, DialogueWithState},
  util::{self, format_price, parse_price},
  views,
};

pub async fn send_balance(
  db: &DbConn,
  config: &Config,
  bot: &BotType,
  chat_id: ChatId,
  user_id: i64,
) -> Result<()> {
  let balance = queries::get_balance(db, user_id).await?;

  bot
    .send_message_easy(
      chat_id,
      format!(
        "Your balance is <code>{}</code>\nUse /topup to add funds",
        format_price(balance, &config.currency)
      ),
    )
    .await?;

  Ok(())
}

pub async fn send_orders(
  db: &DbConn,
  config: &Config,
  bot: &BotType,
  chat_id: ChatId,
  user_id: i64,
) -> Result<()> {
  let mut orders = vec![];
  for order in queries::list_orders(db, user_id, 10).await? {
    let items = queries::get_order_items(db, order.order_id).await?;
    orders.push((order, items));
  }

  bot
    .send_message_easy(chat_id, views::orders_text(&orders, &config.currency))
    .await?;
  Ok(())
}

pub async fn start_topup(
  config: &Config,
  bot: &BotType,
  dialogue: &DialogueWithState,
  chat_id: ChatId,
) -> Result<()> {
  bot
    .send_message_buttons(
      chat_id,
      format!(
        "How much do you want to add? Send an amount between <code>{}</code> and <code>{}</code>",
        format_price(config.topup_min, &config.currency),
        format_price(config.topup_max, &config.currency)
      ),
      vec!["/cancel"],
    )
    .await?;

  dialogue
    .update(ConversationState::ReceiveTopupAmount)
    .await?;

  Ok(())
}

pub fn validate_topup_amount(config: &Config, text: &str) -> Result<i64, String> {
  let Some(amount) = parse_price(text) else {
    return Err("Please send a number like <code>25</code> or <code>12.50</code>".to_string());
  };

  if amount < config.topup_min || amount > config.topup_max {
    return Err(format!(
      "The amount must be between <code>{}</code> and <code>{}</code>",
      format_price(config.topup_min, &config.currency),
      format_price(config.topup_max, &config.currency)
    ));
  }

  Ok(amount)
}

pub async fn receive_topup_amount(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
) -> Result<()> {
  let user = sender(&msg)?;
  let user_id = register(&db, user).await?;

  let amount = match validate_topup_amount(&config, &text_of(&msg).unwrap_or_default()) {
    Ok(amount) => amount,
    Err(reason) => {
      bot
        .send_message_buttons(msg.chat.id, reason, vec!["/cancel"])
        .await?;
      return Ok(());
    }
  };

  let topup_id = queries::create_topup(&db, user_id, amount, util::get_unix()).await?;
  dialogue.update(ConversationState::Idle).await?;

  log::info!("Top-up {} of {} requested by {}", topup_id, amount, user_id);

  bot
    .send_message_easy(
      msg.chat.id,
      format!(
        "Top-up request <b>#{}</b> for <code>{}</code> created.\n\
        Your balance will be updated once it is confirmed.",
        topup_id,
        format_price(amount, &config.currency)
      ),
    )
    .await?;

  if let Some(topup) = queries::get_topup(&db, topup_id).await? {
    let view = views::topup_request_view(&topup, user.username.as_deref(), &config.currency);
    notify_admins(&bot, &config, view).await;
  }

  Ok(())
}

/// Approves or rejects a top-up and tells its owner. Returns the notice for
/// the admin.
pub async fn resolve_topup(
  db: &DbConn,
  config: &Config,
  bot: &BotType,
  topup_id: i64,
  approve: bool,
) -> Result<String> {
  let resolved = queries::resolve_topup(db, topup_id, approve, util::get_unix()).await;
  let topup = match rule_notice::<TopupError, _>(resolved)? {
    Ok(topup) => topup,
    Err(reason) => return Ok(reason),
  };

  let amount = format_price(topup.amount, &config.currency);
  match topup.status {
    TopupStatus::Approved => {
      let balance = queries::get_balance(db, topup.user_id).await?;
      notify_user(
        bot,
        topup.user_id,
        format!(
          "Your top-up <b>#{}</b> of <code>{}</code> was approved.\nBalance: <code>{}</code>",
          topup.topup_id,
          amount,
          format_price(balance, &config.currency)
        ),
      )
      .await;
      Ok(format!("Top-up #{} approved", topup.topup_id))
    }
    _ => {
      notify_user(
        bot,
        topup.user_id,
        format!(
          "Your top-up <b>#{}</b> of <code>{}</code> was rejected.\nContact /support if you think this is a mistake.",
          topup.topup_id, amount
        ),
      )
      .await;
      Ok(format!("Top-up #{} rejected", topup.topup_id))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn topup_amount_bounds() {
    let config = Config {
      topup_min: 500,
      topup_max: 10_000,
      ..Config::default()
    };

    assert_eq!(validate_topup_amount(&config, "5"), Ok(500));
    assert_eq!(validate_topup_amount(&config, "100.00"), Ok(10_000));
    assert!(validate_topup_amount(&config, "4.99").is_err());
    assert!(validate_topup_amount(&config, "100.01").is_err());
    assert!(validate_topup_amount(&config, "lots").is_err());
  }
}
