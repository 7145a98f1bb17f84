pub mod admin;
pub mod balance;
pub mod callback;
pub mod cart;
pub mod catalog;
pub mod command;
pub mod send_message;
pub mod support;

use anyhow::{Context, Result};
use teloxide::types::{ChatId, Message, User};

use crate::{
  database::queries,
  types::{BotType, ConfigType, DbConn},
  views::View,
};

use send_message::BetterSendMessage as _;

pub fn sender(msg: &Message) -> Result<&User> {
  msg.from.as_ref().context("Message without sender")
}

// Makes sure the user has a row before anything references it
pub async fn register(db: &DbConn, user: &User) -> Result<i64> {
  let user_id = user.id.0 as i64;
  queries::ensure_user(db, user_id, user.username.clone()).await?;
  Ok(user_id)
}

pub fn from_admin(msg: Message, config: ConfigType) -> bool {
  msg
    .from
    .as_ref()
    .map(|user| config.is_admin(user.id.0))
    .unwrap_or(false)
}

/// Splits off errors of type `E` as a notice for the user. Anything else stays
/// an error for the dispatcher to log.
pub fn rule_notice<E, T>(result: Result<T>) -> Result<Result<T, String>>
where
  E: std::error::Error + Send + Sync + 'static,
{
  match result {
    Ok(value) => Ok(Ok(value)),
    Err(e) => match e.downcast::<E>() {
      Ok(rule) => Ok(Err(rule.to_string())),
      Err(e) => Err(e),
    },
  }
}

pub fn text_of(msg: &Message) -> Option<String> {
  msg
    .text()
    .map(|text| text.trim().to_string())
    .filter(|text| !text.is_empty())
}

/// Sends `view` to every admin. Admins who never talked to the bot can't be
/// messaged, that only gets logged.
pub async fn notify_admins(bot: &BotType, config: &ConfigType, view: View) {
  for admin_id in &config.admin_ids {
    let result = bot.send_view(ChatId(*admin_id as i64), view.clone()).await;
    if let Err(e) = result {
      log::warn!("Failed to notify admin {}: {:?}", admin_id, e);
    }
  }
}

pub async fn notify_user<T>(bot: &BotType, user_id: i64, text: T)
where
  T: Into<String>,
{
  if let Err(e) = bot.send_message_easy(ChatId(user_id), text).await {
    log::warn!("Failed to notify user {}: {:?}", user_id, e);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::queries::TopupError;
  use crate::shop::TicketError;
  use anyhow::anyhow;

  #[test]
  fn rule_errors_become_notices() {
    let limited: Result<()> = Err(TicketError::TooManyOpen { max: 3 }.into());
    assert_eq!(
      rule_notice::<TicketError, _>(limited).unwrap(),
      Err("You already have 3 open tickets, please wait for them to be answered".to_string())
    );

    let handled: Result<()> = Err(TopupError::NotPending { topup_id: 9 }.into());
    assert_eq!(
      rule_notice::<TopupError, _>(handled).unwrap(),
      Err("Top-up #9 was already handled".to_string())
    );

    assert_eq!(rule_notice::<TopupError, _>(Ok(5)).unwrap(), Ok(5));
  }

  #[test]
  fn other_errors_propagate() {
    let broken: Result<()> = Err(anyhow!("database gone"));
    assert!(rule_notice::<TopupError, _>(broken).is_err());

    let wrong_kind: Result<()> = Err(TicketError::TooManyOpen { max: 3 }.into());
    assert!(rule_notice::<TopupError, _>(wrong_kind).is_err());
  }
}
