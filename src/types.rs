use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use teloxide::{adaptors::DefaultParseMode, dispatching::dialogue::InMemStorage, prelude::Dialogue, Bot};

use crate::config::Config;

pub type DialogueWithState = Dialogue<ConversationState, InMemStorage<ConversationState>>;

pub type BotType = DefaultParseMode<Bot>;
pub type DbConn = Pool<Sqlite>;
pub type DbType = Arc<DbConn>;
pub type ConfigType = Arc<Config>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductDraft {
  pub category_id: i64,
  pub name: String,
  pub price: i64,
  pub stock: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKey {
  Welcome,
  Help,
  Support,
}

impl ContentKey {
  pub const ALL: [ContentKey; 3] = [ContentKey::Welcome, ContentKey::Help, ContentKey::Support];

  pub fn as_str(self) -> &'static str {
    match self {
      ContentKey::Welcome => "welcome",
      ContentKey::Help => "help",
      ContentKey::Support => "support",
    }
  }

  pub fn parse(key: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|k| k.as_str() == key)
  }

  pub fn default_body(self) -> &'static str {
    match self {
      ContentKey::Welcome => "Welcome to the shop! Use /catalog to browse our products.",
      ContentKey::Help => "Browse with /catalog, manage your /cart, add funds with /topup.",
      ContentKey::Support => "Describe your problem and we will get back to you as soon as possible.",
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ConversationState {
  #[default]
  Idle,

  ReceiveTopupAmount,

  ReceiveTicketSubject,
  ReceiveTicketMessage {
    subject: String,
  },
  ReceiveTicketReply {
    ticket_id: i64,
  },
  ReceiveAdminReply {
    ticket_id: i64,
  },

  ReceiveCategoryName,
  ReceiveProductName {
    category_id: i64,
  },
  ReceiveProductPrice {
    draft: ProductDraft,
  },
  ReceiveProductStock {
    draft: ProductDraft,
  },
  ReceiveProductDescription {
    draft: ProductDraft,
  },
  ReceiveNewPrice {
    product_id: i64,
  },
  ReceiveNewStock {
    product_id: i64,
  },
  ReceiveContent {
    key: ContentKey,
  },
  ReceiveCatalogImport,
}
