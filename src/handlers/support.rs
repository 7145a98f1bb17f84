use std::sync::Arc;

use anyhow::Result;
use teloxide::types::{ChatId, Message};

use super::send_message::BetterSendMessage as _;
use super::{notify_admins, notify_user, register, rule_notice, sender, text_of};
use crate::{
  config::Config,
  database::queries,
  shop::TicketError,
  types::{BotType, ConfigType, ContentKey, ConversationState, DbConn, DialogueWithState},
  util::{self, escape_html},
  views::{self, View},
};

const MAX_SUBJECT_LENGTH: usize = 100;
const MAX_MESSAGE_LENGTH: usize = 3000;

fn ticket_notice<T>(result: Result<T>) -> Result<Result<T, String>> {
  rule_notice::<TicketError, T>(result)
}

pub async fn start_ticket(
  db: &DbConn,
  config: &Config,
  bot: &BotType,
  dialogue: &DialogueWithState,
  chat_id: ChatId,
  user_id: i64,
) -> Result<()> {
  let allowed = queries::can_open_ticket(db, user_id, config.ticket_limits(), util::get_unix()).await;
  if let Err(reason) = ticket_notice(allowed)? {
    bot.send_message_easy(chat_id, reason).await?;
    return Ok(());
  }

  let intro = queries::get_content(db, ContentKey::Support).await?;

  bot
    .send_message_buttons(
      chat_id,
      format!(
        "{}\n\nWhat is your request about? Send a short subject.",
        escape_html(&intro)
      ),
      vec!["/cancel"],
    )
    .await?;

  dialogue
    .update(ConversationState::ReceiveTicketSubject)
    .await?;

  Ok(())
}

pub async fn receive_ticket_subject(
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
) -> Result<()> {
  let Some(subject) = text_of(&msg) else {
    bot
      .send_message_buttons(msg.chat.id, "Please send the subject as text", vec!["/cancel"])
      .await?;
    return Ok(());
  };

  if subject.chars().count() > MAX_SUBJECT_LENGTH {
    bot
      .send_message_buttons(
        msg.chat.id,
        format!("Please keep the subject under {} characters", MAX_SUBJECT_LENGTH),
        vec!["/cancel"],
      )
      .await?;
    return Ok(());
  }

  bot
    .send_message_buttons(msg.chat.id, "Now describe your problem", vec!["/cancel"])
    .await?;

  dialogue
    .update(ConversationState::ReceiveTicketMessage { subject })
    .await?;

  Ok(())
}

fn message_body(msg: &Message) -> Result<String, String> {
  match text_of(msg) {
    None => Err("Please send your message as text".to_string()),
    Some(body) if body.chars().count() > MAX_MESSAGE_LENGTH => Err(format!(
      "Please keep your message under {} characters",
      MAX_MESSAGE_LENGTH
    )),
    Some(body) => Ok(body),
  }
}

pub async fn receive_ticket_message(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  subject: String,
) -> Result<()> {
  let user_id = register(&db, sender(&msg)?).await?;

  let body = match message_body(&msg) {
    Ok(body) => body,
    Err(reason) => {
      bot
        .send_message_buttons(msg.chat.id, reason, vec!["/cancel"])
        .await?;
      return Ok(());
    }
  };

  dialogue.update(ConversationState::Idle).await?;

  let created = queries::create_ticket(
    &db,
    user_id,
    subject,
    body,
    config.ticket_limits(),
    util::get_unix(),
  )
  .await;

  let ticket_id = match ticket_notice(created)? {
    Ok(ticket_id) => ticket_id,
    Err(reason) => {
      bot.send_message_easy(msg.chat.id, reason).await?;
      return Ok(());
    }
  };

  bot
    .send_message_easy(
      msg.chat.id,
      format!(
        "Ticket <b>#{}</b> created, we will get back to you soon.\nSee /tickets for all your tickets.",
        ticket_id
      ),
    )
    .await?;

  if let Some(view) = ticket(&db, ticket_id, true).await? {
    notify_admins(&bot, &config, view).await;
  }

  Ok(())
}

pub async fn ticket(db: &DbConn, ticket_id: i64, admin: bool) -> Result<Option<View>> {
  let Some(ticket) = queries::get_ticket(db, ticket_id).await? else {
    return Ok(None);
  };

  let messages = queries::get_ticket_messages(db, ticket_id).await?;
  Ok(Some(views::ticket_view(&ticket, &messages, admin)))
}

pub async fn send_user_tickets(
  db: &DbConn,
  bot: &BotType,
  chat_id: ChatId,
  user_id: i64,
) -> Result<()> {
  let tickets = queries::list_user_tickets(db, user_id).await?;
  bot
    .send_view(chat_id, views::tickets_view(&tickets, false))
    .await?;
  Ok(())
}

/// Closes a ticket on behalf of its owner or an admin, telling the other side.
pub async fn close(
  db: &DbConn,
  bot: &BotType,
  ticket_id: i64,
  by_admin: bool,
) -> Result<String> {
  let closed = queries::close_ticket(db, ticket_id, util::get_unix()).await;
  let ticket = match ticket_notice(closed)? {
    Ok(ticket) => ticket,
    Err(reason) => return Ok(reason),
  };

  if by_admin {
    notify_user(
      bot,
      ticket.user_id,
      format!("Your ticket <b>#{}</b> was closed by support", ticket.ticket_id),
    )
    .await;
  }

  Ok(format!("Ticket #{} closed", ticket.ticket_id))
}

pub async fn reopen(db: &DbConn, config: &Config, ticket_id: i64) -> Result<String> {
  let reopened = queries::reopen_ticket(db, ticket_id, config.ticket_limits(), util::get_unix()).await;
  match ticket_notice(reopened)? {
    Ok(ticket) => Ok(format!("Ticket #{} reopened", ticket.ticket_id)),
    Err(reason) => Ok(reason),
  }
}

pub async fn start_reply(
  bot: &BotType,
  dialogue: &DialogueWithState,
  chat_id: ChatId,
  ticket_id: i64,
  admin: bool,
) -> Result<()> {
  bot
    .send_message_buttons(
      chat_id,
      format!("Send your reply to ticket <b>#{}</b>", ticket_id),
      vec!["/cancel"],
    )
    .await?;

  let state = if admin {
    ConversationState::ReceiveAdminReply { ticket_id }
  } else {
    ConversationState::ReceiveTicketReply { ticket_id }
  };
  dialogue.update(state).await?;

  Ok(())
}

pub async fn receive_ticket_reply(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  ticket_id: i64,
) -> Result<()> {
  let user_id = register(&db, sender(&msg)?).await?;

  let body = match message_body(&msg) {
    Ok(body) => body,
    Err(reason) => {
      bot
        .send_message_buttons(msg.chat.id, reason, vec!["/cancel"])
        .await?;
      return Ok(());
    }
  };

  dialogue.update(ConversationState::Idle).await?;

  let owned = queries::get_ticket(&db, ticket_id)
    .await?
    .map(|ticket| ticket.user_id == user_id)
    .unwrap_or(false);
  if !owned {
    bot
      .send_message_easy(msg.chat.id, "That ticket does not exist")
      .await?;
    return Ok(());
  }

  let added = queries::add_ticket_message(&db, ticket_id, false, body, util::get_unix()).await;
  if let Err(reason) = ticket_notice(added)? {
    bot.send_message_easy(msg.chat.id, reason).await?;
    return Ok(());
  }

  bot
    .send_message_easy(msg.chat.id, format!("Reply added to ticket <b>#{}</b>", ticket_id))
    .await?;

  if let Some(view) = ticket(&db, ticket_id, true).await? {
    notify_admins(&bot, &config, view).await;
  }

  Ok(())
}

pub async fn receive_admin_reply(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  msg: Message,
  ticket_id: i64,
) -> Result<()> {
  if !config.is_admin(sender(&msg)?.id.0) {
    dialogue.update(ConversationState::Idle).await?;
    return Ok(());
  }

  let body = match message_body(&msg) {
    Ok(body) => body,
    Err(reason) => {
      bot
        .send_message_buttons(msg.chat.id, reason, vec!["/cancel"])
        .await?;
      return Ok(());
    }
  };

  dialogue.update(ConversationState::Idle).await?;

  let added = queries::add_ticket_message(&db, ticket_id, true, body.clone(), util::get_unix()).await;
  let ticket = match ticket_notice(added)? {
    Ok(ticket) => ticket,
    Err(reason) => {
      bot.send_message_easy(msg.chat.id, reason).await?;
      return Ok(());
    }
  };

  notify_user(
    &bot,
    ticket.user_id,
    format!(
      "<b>Support replied to ticket #{}</b>\n{}\n\nSee /tickets to answer.",
      ticket.ticket_id,
      escape_html(&body)
    ),
  )
  .await;

  bot
    .send_message_easy(msg.chat.id, format!("Reply sent to ticket <b>#{}</b>", ticket_id))
    .await?;

  Ok(())
}
