use std::sync::Arc;

use anyhow::Result;
use teloxide::{
  macros::BotCommands,
  types::{Me, Message},
  utils::command::BotCommands as _,
};

use super::send_message::BetterSendMessage;
use super::{admin, balance, cart, catalog, register, sender, support};
use crate::{
  database::queries,
  types::{BotType, ConfigType, ContentKey, ConversationState, DbConn, DialogueWithState},
  util::escape_html,
};

#[derive(BotCommands, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
  #[command(description = "Show all help for this bot")]
  Help,

  #[command(description = "Start using this bot")]
  Start,

  #[command(description = "Browse the catalog")]
  Catalog,

  #[command(description = "Show your cart")]
  Cart,

  #[command(description = "Show your balance")]
  Balance,

  #[command(description = "Add funds to your balance")]
  Topup,

  #[command(description = "Show your orders")]
  Orders,

  #[command(description = "Contact support")]
  Support,

  #[command(description = "Show your support tickets")]
  Tickets,

  #[command(description = "Stop whatever you are doing")]
  Cancel,

  #[command(description = "Shop management (admins only)")]
  Admin,

  #[command(description = "Export the catalog (admins only)")]
  Export,

  #[command(description = "Import a catalog (admins only)")]
  Import,

  #[command(description = "Shows global statistics (admins only)")]
  Stats,
}

impl Command {
  fn starts_dialogue(&self) -> bool {
    matches!(self, Command::Topup | Command::Support | Command::Import)
  }

  fn admin_only(&self) -> bool {
    matches!(
      self,
      Command::Admin | Command::Export | Command::Import | Command::Stats
    )
  }
}

pub fn is_command(msg: Message) -> bool {
  msg.text().map(|text| text.starts_with('/')).unwrap_or(false)
}

pub async fn receive_command(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  me: Me,
  dialogue: DialogueWithState,
  msg: Message,
) -> Result<()> {
  let user = sender(&msg)?;
  let user_id = register(&db, user).await?;
  let text = msg.text().unwrap_or_default();

  let command = match Command::parse(text, me.username()) {
    Ok(command) => command,
    Err(_) => {
      bot
        .send_message_easy(msg.chat.id, "Unknown command, see /help")
        .await?;
      return Ok(());
    }
  };

  log::debug!("Got command {:?} from {:?}", command, user_id);

  if command.admin_only() && !config.is_admin(user.id.0) {
    bot
      .send_message_easy(msg.chat.id, "This command is only for admins")
      .await?;
    return Ok(());
  }

  if command.starts_dialogue()
    && dialogue.get().await?.unwrap_or_default() != ConversationState::Idle
  {
    bot
      .send_message_easy(msg.chat.id, "Please finish your action, or /cancel")
      .await?;
    return Ok(());
  }

  match command {
    Command::Help => {
      let help = queries::get_content(&db, ContentKey::Help).await?;
      bot
        .send_message_easy(
          msg.chat.id,
          format!(
            "{}\n\n<b>Commands</b>\n{}",
            escape_html(&help),
            escape_html(&Command::descriptions().to_string())
          ),
        )
        .await?;
    }
    Command::Start => {
      let welcome = queries::get_content(&db, ContentKey::Welcome).await?;
      bot
        .send_message_easy(msg.chat.id, escape_html(&welcome))
        .await?;
    }
    Command::Catalog => {
      catalog::send_categories(&db, &bot, msg.chat.id).await?;
    }
    Command::Cart => {
      cart::send_cart(&db, &config, &bot, msg.chat.id, user_id).await?;
    }
    Command::Balance => {
      balance::send_balance(&db, &config, &bot, msg.chat.id, user_id).await?;
    }
    Command::Topup => {
      balance::start_topup(&config, &bot, &dialogue, msg.chat.id).await?;
    }
    Command::Orders => {
      balance::send_orders(&db, &config, &bot, msg.chat.id, user_id).await?;
    }
    Command::Support => {
      support::start_ticket(&db, &config, &bot, &dialogue, msg.chat.id, user_id).await?;
    }
    Command::Tickets => {
      support::send_user_tickets(&db, &bot, msg.chat.id, user_id).await?;
    }
    Command::Cancel => {
      dialogue.update(ConversationState::Idle).await?;
      bot.send_message_easy(msg.chat.id, "Cancelled").await?;
    }
    Command::Admin => {
      admin::send_admin_menu(&bot, msg.chat.id).await?;
    }
    Command::Export => {
      admin::send_catalog_export(&db, &bot, msg.chat.id).await?;
    }
    Command::Import => {
      bot
        .send_message_buttons(
          msg.chat.id,
          "Ready to import, please send me a catalog file you got from /export",
          vec!["/cancel"],
        )
        .await?;
      dialogue
        .update(ConversationState::ReceiveCatalogImport)
        .await?;
    }
    Command::Stats => {
      admin::send_stats(&db, &config, &bot, msg.chat.id).await?;
    }
  }

  Ok(())
}

// Plain text while no action is in progress
pub async fn receive_idle(bot: BotType, msg: Message) -> Result<()> {
  bot
    .send_message_easy(
      msg.chat.id,
      "Use /catalog to browse the shop, or /help to see everything I can do",
    )
    .await?;
  Ok(())
}
