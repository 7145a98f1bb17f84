use std::sync::Arc;

use anyhow::Result;
use teloxide::{
  payloads::AnswerCallbackQuerySetters,
  requests::Requester,
  types::{CallbackQuery, ChatId},
};

use super::send_message::{show_view, BetterSendMessage as _};
use super::{admin, balance, cart, catalog, register, support};
use crate::{
  callback::CallbackData,
  config::Config,
  database::queries,
  types::{BotType, ConfigType, DbConn, DialogueWithState},
  views,
};

/// Who is looking at a ticket: `Some(true)` for an admin, `Some(false)` for
/// its owner, `None` for anybody else.
fn ticket_role(owner_id: i64, user_id: i64, is_admin: bool) -> Option<bool> {
  if owner_id == user_id {
    Some(false)
  } else if is_admin {
    Some(true)
  } else {
    None
  }
}

const FAILED_NOTICE: &str = "Something went wrong, please try again";

pub async fn receive_callback(
  db: Arc<DbConn>,
  config: ConfigType,
  bot: BotType,
  dialogue: DialogueWithState,
  q: CallbackQuery,
) -> Result<()> {
  let result = handle_callback(&db, &config, &bot, &dialogue, &q).await;

  // Answer even on failure, so the button stops spinning
  match answer_text(&result) {
    Some(text) => bot.answer_callback_query(q.id.clone()).text(text).await?,
    None => bot.answer_callback_query(q.id.clone()).await?,
  };

  result.map(|_| ())
}

fn answer_text(result: &Result<Option<String>>) -> Option<String> {
  match result {
    Ok(notice) => notice.as_deref().map(plain_text),
    Err(_) => Some(FAILED_NOTICE.to_string()),
  }
}

/// Runs the action behind a button and returns the notice to answer with.
async fn handle_callback(
  db: &DbConn,
  config: &Config,
  bot: &BotType,
  dialogue: &DialogueWithState,
  q: &CallbackQuery,
) -> Result<Option<String>> {
  let user_id = register(db, &q.from).await?;
  let is_admin = config.is_admin(q.from.id.0);
  let chat_id = q
    .message
    .as_ref()
    .map(|message| message.chat().id)
    .unwrap_or(ChatId(user_id));
  let origin = q.message.as_ref();

  let Some(data) = q.data.as_deref().and_then(CallbackData::parse) else {
    log::debug!("Unknown callback data {:?} from {:?}", q.data, user_id);
    return Ok(None);
  };

  log::debug!("Got callback {:?} from {:?}", data, user_id);

  if data.is_admin_only() && !is_admin {
    return Ok(Some("Admins only".to_string()));
  }

  let mut notice: Option<String> = None;
  let gone = || Some("This is no longer available".to_string());

  match data {
    CallbackData::Categories => {
      show_view(bot, chat_id, origin, catalog::categories(db).await?).await?;
    }
    CallbackData::Category(category_id) => {
      match catalog::category(db, &config.currency, category_id).await? {
        Some(view) => show_view(bot, chat_id, origin, view).await?,
        None => notice = gone(),
      }
    }
    CallbackData::Product(product_id) => {
      match catalog::product(db, &config.currency, user_id, product_id).await? {
        Some(view) => show_view(bot, chat_id, origin, view).await?,
        None => notice = gone(),
      }
    }
    CallbackData::AddToCart(product_id) => {
      notice = Some(cart::change_quantity(db, config, user_id, product_id, 1).await?);
      if let Some(view) = catalog::product(db, &config.currency, user_id, product_id).await? {
        show_view(bot, chat_id, origin, view).await?;
      }
    }

    CallbackData::Cart => {
      show_view(bot, chat_id, origin, cart::cart(db, config, user_id).await?).await?;
    }
    CallbackData::CartIncrease(product_id) | CallbackData::CartDecrease(product_id) => {
      let delta = if matches!(data, CallbackData::CartIncrease(_)) { 1 } else { -1 };
      notice = Some(cart::change_quantity(db, config, user_id, product_id, delta).await?);
      show_view(bot, chat_id, origin, cart::cart(db, config, user_id).await?).await?;
    }
    CallbackData::CartRemove(product_id) => {
      notice = Some(cart::remove_line(db, user_id, product_id).await?);
      show_view(bot, chat_id, origin, cart::cart(db, config, user_id).await?).await?;
    }
    CallbackData::CartClear => {
      notice = Some(cart::clear(db, user_id).await?);
      show_view(bot, chat_id, origin, cart::cart(db, config, user_id).await?).await?;
    }
    CallbackData::Checkout => {
      let (placed, text) = cart::checkout(db, config, user_id).await?;
      if placed {
        show_view(bot, chat_id, origin, cart::cart(db, config, user_id).await?).await?;
        bot.send_message_easy(chat_id, text).await?;
      } else {
        notice = Some(text);
      }
    }

    CallbackData::TopupApprove(topup_id) | CallbackData::TopupReject(topup_id) => {
      let approve = matches!(data, CallbackData::TopupApprove(_));
      let text = balance::resolve_topup(db, config, bot, topup_id, approve).await?;
      bot.send_message_easy(chat_id, text.clone()).await?;
      notice = Some(text);
    }

    CallbackData::Ticket(ticket_id)
    | CallbackData::TicketReply(ticket_id)
    | CallbackData::TicketClose(ticket_id)
    | CallbackData::TicketReopen(ticket_id) => {
      let role = queries::get_ticket(db, ticket_id)
        .await?
        .and_then(|ticket| ticket_role(ticket.user_id, user_id, is_admin));

      let Some(as_admin) = role else {
        return Ok(Some("That ticket does not exist".to_string()));
      };

      match data {
        CallbackData::TicketReply(_) => {
          support::start_reply(bot, dialogue, chat_id, ticket_id, as_admin).await?;
        }
        CallbackData::TicketClose(_) => {
          notice = Some(support::close(db, bot, ticket_id, as_admin).await?);
        }
        CallbackData::TicketReopen(_) => {
          notice = Some(support::reopen(db, config, ticket_id).await?);
        }
        _ => {}
      }

      if !matches!(data, CallbackData::TicketReply(_)) {
        if let Some(view) = support::ticket(db, ticket_id, as_admin).await? {
          show_view(bot, chat_id, origin, view).await?;
        }
      }
    }

    CallbackData::AdminMenu => {
      show_view(bot, chat_id, origin, views::admin_menu_view()).await?;
    }
    CallbackData::AdminCatalog => {
      show_view(bot, chat_id, origin, admin::catalog(db).await?).await?;
    }
    CallbackData::AdminAddCategory => {
      admin::start_category(bot, dialogue, chat_id).await?;
    }
    CallbackData::AdminAddProduct(category_id) => {
      admin::start_product(bot, dialogue, chat_id, category_id).await?;
    }
    CallbackData::AdminCategory(category_id) => {
      match admin::category(db, config, category_id).await? {
        Some(view) => show_view(bot, chat_id, origin, view).await?,
        None => notice = gone(),
      }
    }
    CallbackData::AdminDeleteCategory(category_id) => {
      if queries::delete_category(db, category_id).await? {
        log::info!("Category {} deleted by {}", category_id, user_id);
        notice = Some("Category deleted".to_string());
      }
      show_view(bot, chat_id, origin, admin::catalog(db).await?).await?;
    }
    CallbackData::AdminProduct(product_id) => {
      match admin::product(db, config, product_id).await? {
        Some(view) => show_view(bot, chat_id, origin, view).await?,
        None => notice = gone(),
      }
    }
    CallbackData::AdminEditPrice(product_id) => {
      admin::start_price_edit(bot, dialogue, chat_id, product_id).await?;
    }
    CallbackData::AdminEditStock(product_id) => {
      admin::start_stock_edit(bot, dialogue, chat_id, product_id).await?;
    }
    CallbackData::AdminDeleteProduct(product_id) => {
      let Some(product) = queries::get_product(db, product_id).await? else {
        return Ok(Some("That product was already deleted".to_string()));
      };

      queries::delete_product(db, product_id).await?;
      log::info!("Product {} deleted by {}", product_id, user_id);
      notice = Some("Product deleted".to_string());

      if let Some(view) = admin::category(db, config, product.category_id).await? {
        show_view(bot, chat_id, origin, view).await?;
      }
    }
    CallbackData::AdminTopups => {
      admin::send_pending_topups(db, config, bot, chat_id).await?;
    }
    CallbackData::AdminTickets => {
      show_view(bot, chat_id, origin, admin::active_tickets(db).await?).await?;
    }
    CallbackData::AdminReply(ticket_id) => {
      support::start_reply(bot, dialogue, chat_id, ticket_id, true).await?;
    }
    CallbackData::AdminContent => {
      show_view(bot, chat_id, origin, views::admin_content_view()).await?;
    }
    CallbackData::AdminEditContent(key) => {
      admin::start_content_edit(db, bot, dialogue, chat_id, key).await?;
    }
  }

  Ok(notice)
}

// Callback answers are shown as plain text
fn plain_text(text: &str) -> String {
  let mut plain = String::with_capacity(text.len());
  let mut in_tag = false;
  for c in text.chars() {
    match c {
      '<' => in_tag = true,
      '>' if in_tag => in_tag = false,
      _ if !in_tag => plain.push(c),
      _ => {}
    }
  }

  // `&amp;` last so escaped entities stay literal
  plain
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&amp;", "&")
}
