use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::callback::CallbackData;
use crate::database::{CartLine, Category, Order, Product, Ticket, TicketMessage, Topup};
use crate::types::ContentKey;
use crate::util::{escape_html, format_price, unix_to_humantime};

#[derive(Debug, Clone, PartialEq)]
pub struct View {
  pub text: String,
  pub markup: InlineKeyboardMarkup,
}

impl View {
  fn new(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
    Self {
      text: text.into(),
      markup: InlineKeyboardMarkup::new(rows),
    }
  }
}

fn button(text: impl Into<String>, data: CallbackData) -> InlineKeyboardButton {
  InlineKeyboardButton::callback(text, data.encode())
}

pub fn categories_view(categories: &[Category]) -> View {
  if categories.is_empty() {
    return View::new("The shop is empty at the moment, come back later", vec![]);
  }

  let rows = categories
    .iter()
    .map(|category| {
      vec![button(
        category.name.clone(),
        CallbackData::Category(category.category_id),
      )]
    })
    .chain([vec![button("🛒 Cart", CallbackData::Cart)]])
    .collect();

  View::new("<b>Catalog</b>\nPick a category:", rows)
}

pub fn category_view(category: &Category, products: &[Product], currency: &str) -> View {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = products
    .iter()
    .map(|product| {
      let label = if product.stock > 0 {
        format!("{} - {}", product.name, format_price(product.price, currency))
      } else {
        format!("{} - sold out", product.name)
      };
      vec![button(label, CallbackData::Product(product.product_id))]
    })
    .collect();
  rows.push(vec![
    button("« Categories", CallbackData::Categories),
    button("🛒 Cart", CallbackData::Cart),
  ]);

  let text = if products.is_empty() {
    format!("<b>{}</b>\nNo products here yet", escape_html(&category.name))
  } else {
    format!("<b>{}</b>\nPick a product:", escape_html(&category.name))
  };

  View::new(text, rows)
}

pub fn product_view(product: &Product, in_cart: i64, currency: &str) -> View {
  let mut text = format!(
    "<b>{}</b>\n{}\n\nPrice: <code>{}</code>\nIn stock: <code>{}</code>",
    escape_html(&product.name),
    escape_html(&product.description),
    format_price(product.price, currency),
    product.stock
  );
  if in_cart > 0 {
    text += &format!("\nIn your cart: <code>{}</code>", in_cart);
  }

  let mut rows = vec![];
  if product.stock > 0 {
    rows.push(vec![button(
      "➕ Add to cart",
      CallbackData::AddToCart(product.product_id),
    )]);
  }
  rows.push(vec![
    button("« Back", CallbackData::Category(product.category_id)),
    button("🛒 Cart", CallbackData::Cart),
  ]);

  View::new(text, rows)
}

/// `expires_at` is when the reservation of the cart runs out.
pub fn cart_view(lines: &[CartLine], balance: i64, expires_at: i64, currency: &str) -> View {
  if lines.is_empty() {
    return View::new(
      format!(
        "Your cart is empty\nBalance: <code>{}</code>",
        format_price(balance, currency)
      ),
      vec![vec![button("« Catalog", CallbackData::Categories)]],
    );
  }

  let total: i64 = lines.iter().map(CartLine::subtotal).sum();

  let mut text = "<b>Your cart</b>\n".to_string();
  for line in lines {
    text += &format!(
      "{} × {} = <code>{}</code>\n",
      escape_html(&line.name),
      line.quantity,
      format_price(line.subtotal(), currency)
    );
  }
  text += &format!(
    "\nTotal: <code>{}</code>\nBalance: <code>{}</code>\nReservation expires {}",
    format_price(total, currency),
    format_price(balance, currency),
    unix_to_humantime(expires_at)
  );

  let mut rows: Vec<Vec<InlineKeyboardButton>> = lines
    .iter()
    .map(|line| {
      vec![
        button("➖", CallbackData::CartDecrease(line.product_id)),
        button(
          format!("{} ({})", line.name, line.quantity),
          CallbackData::Product(line.product_id),
        ),
        button("➕", CallbackData::CartIncrease(line.product_id)),
        button("✖", CallbackData::CartRemove(line.product_id)),
      ]
    })
    .collect();
  rows.push(vec![
    button("🗑 Clear", CallbackData::CartClear),
    button("✅ Checkout", CallbackData::Checkout),
  ]);
  rows.push(vec![button("« Catalog", CallbackData::Categories)]);

  View::new(text, rows)
}

/// Each order comes with its `(name, price, quantity)` lines.
pub fn orders_text(orders: &[(Order, Vec<(String, i64, i64)>)], currency: &str) -> String {
  if orders.is_empty() {
    return "You have no orders yet".to_string();
  }

  let mut text = "<b>Your orders</b>\n".to_string();
  for (order, items) in orders {
    text += &format!(
      "\n<b>#{}</b> - <code>{}</code> - {}\n",
      order.order_id,
      format_price(order.total, currency),
      unix_to_humantime(order.created_at)
    );
    for (name, price, quantity) in items {
      text += &format!(
        "  {} × {} ({})\n",
        escape_html(name),
        quantity,
        format_price(*price, currency)
      );
    }
  }
  text
}

pub fn topup_request_view(topup: &Topup, username: Option<&str>, currency: &str) -> View {
  let who = match username {
    Some(username) => format!("@{}", escape_html(username)),
    None => format!("<code>{}</code>", topup.user_id),
  };

  View::new(
    format!(
      "<b>Top-up #{}</b>\nUser: {}\nAmount: <code>{}</code>\nRequested {}",
      topup.topup_id,
      who,
      format_price(topup.amount, currency),
      unix_to_humantime(topup.created_at)
    ),
    vec![vec![
      button("✅ Approve", CallbackData::TopupApprove(topup.topup_id)),
      button("❌ Reject", CallbackData::TopupReject(topup.topup_id)),
    ]],
  )
}

pub fn tickets_view(tickets: &[Ticket], admin: bool) -> View {
  if tickets.is_empty() {
    let text = if admin {
      "No active tickets"
    } else {
      "You have no tickets, use /support to open one"
    };
    return View::new(text, vec![]);
  }

  let rows = tickets
    .iter()
    .map(|ticket| {
      vec![button(
        format!(
          "#{} [{}] {}",
          ticket.ticket_id,
          ticket.status.label(),
          ticket.subject
        ),
        CallbackData::Ticket(ticket.ticket_id),
      )]
    })
    .collect();

  let title = if admin { "<b>Active tickets</b>" } else { "<b>Your tickets</b>" };
  View::new(title, rows)
}

pub fn ticket_view(ticket: &Ticket, messages: &[TicketMessage], admin: bool) -> View {
  let mut text = format!(
    "<b>Ticket #{}</b>: {}\nStatus: <i>{}</i>\n",
    ticket.ticket_id,
    escape_html(&ticket.subject),
    ticket.status.label()
  );
  for message in messages {
    let author = if message.from_admin { "Support" } else { "You" };
    let author = if admin && !message.from_admin { "User" } else { author };
    text += &format!(
      "\n<b>{}</b> ({}):\n{}\n",
      author,
      unix_to_humantime(message.created_at),
      escape_html(&message.body)
    );
  }

  let mut row = vec![];
  if ticket.status.is_active() {
    let reply = if admin {
      CallbackData::AdminReply(ticket.ticket_id)
    } else {
      CallbackData::TicketReply(ticket.ticket_id)
    };
    row.push(button("✏️ Reply", reply));
    row.push(button("🔒 Close", CallbackData::TicketClose(ticket.ticket_id)));
  } else if !admin {
    row.push(button("🔓 Reopen", CallbackData::TicketReopen(ticket.ticket_id)));
  }

  let rows = if row.is_empty() { vec![] } else { vec![row] };
  View::new(text, rows)
}

pub fn admin_menu_view() -> View {
  View::new(
    "<b>Admin</b>",
    vec![
      vec![button("📦 Catalog", CallbackData::AdminCatalog)],
      vec![button("➕ New category", CallbackData::AdminAddCategory)],
      vec![
        button("💰 Top-ups", CallbackData::AdminTopups),
        button("🎫 Tickets", CallbackData::AdminTickets),
      ],
      vec![button("📝 Texts", CallbackData::AdminContent)],
    ],
  )
}

pub fn admin_categories_view(categories: &[Category]) -> View {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
    .iter()
    .map(|category| {
      vec![button(
        category.name.clone(),
        CallbackData::AdminCategory(category.category_id),
      )]
    })
    .collect();
  rows.push(vec![button("➕ New category", CallbackData::AdminAddCategory)]);
  rows.push(vec![button("« Admin", CallbackData::AdminMenu)]);

  View::new("<b>Manage catalog</b>", rows)
}

pub fn admin_category_view(category: &Category, products: &[Product], currency: &str) -> View {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = products
    .iter()
    .map(|product| {
      vec![button(
        format!(
          "{} - {} ({})",
          product.name,
          format_price(product.price, currency),
          product.stock
        ),
        CallbackData::AdminProduct(product.product_id),
      )]
    })
    .collect();
  rows.push(vec![
    button("➕ New product", CallbackData::AdminAddProduct(category.category_id)),
    button("🗑 Delete category", CallbackData::AdminDeleteCategory(category.category_id)),
  ]);
  rows.push(vec![button("« Catalog", CallbackData::AdminCatalog)]);

  View::new(format!("<b>{}</b>", escape_html(&category.name)), rows)
}

pub fn admin_product_view(product: &Product, currency: &str) -> View {
  View::new(
    format!(
      "<b>{}</b>\n{}\n\nPrice: <code>{}</code>\nStock: <code>{}</code>",
      escape_html(&product.name),
      escape_html(&product.description),
      format_price(product.price, currency),
      product.stock
    ),
    vec![
      vec![
        button("💲 Price", CallbackData::AdminEditPrice(product.product_id)),
        button("📦 Stock", CallbackData::AdminEditStock(product.product_id)),
      ],
      vec![button("🗑 Delete", CallbackData::AdminDeleteProduct(product.product_id))],
      vec![button("« Back", CallbackData::AdminCategory(product.category_id))],
    ],
  )
}

pub fn admin_content_view() -> View {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = ContentKey::ALL
    .into_iter()
    .map(|key| vec![button(key.as_str(), CallbackData::AdminEditContent(key))])
    .collect();
  rows.push(vec![button("« Admin", CallbackData::AdminMenu)]);

  View::new("<b>Editable texts</b>\nPick one to replace it:", rows)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::shop::TicketStatus;
  use teloxide::types::InlineKeyboardButtonKind;

  fn callbacks(view: &View) -> Vec<Vec<String>> {
    view
      .markup
      .inline_keyboard
      .iter()
      .map(|row| {
        row
          .iter()
          .filter_map(|b| match &b.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
          })
          .collect()
      })
      .collect()
  }

  fn product(stock: i64) -> Product {
    Product {
      product_id: 7,
      category_id: 3,
      name: "Tea <green>".into(),
      description: "Loose leaf".into(),
      price: 450,
      stock,
    }
  }

  #[test]
  fn sold_out_product_has_no_add_button() {
    let view = product_view(&product(0), 0, "USD");
    assert_eq!(callbacks(&view), vec![vec!["cat:3".to_string(), "cart".to_string()]]);
    assert!(view.text.contains("Tea &lt;green&gt;"));
  }

  #[test]
  fn product_shows_cart_quantity() {
    let view = product_view(&product(5), 2, "USD");
    assert_eq!(callbacks(&view)[0], vec!["add:7".to_string()]);
    assert!(view.text.contains("In your cart: <code>2</code>"));
    assert!(view.text.contains("4.50 USD"));
  }

  #[test]
  fn cart_lists_lines_and_total() {
    let lines = vec![
      CartLine {
        product_id: 1,
        name: "A".into(),
        price: 100,
        quantity: 2,
        reserved_at: 0,
      },
      CartLine {
        product_id: 2,
        name: "B".into(),
        price: 50,
        quantity: 1,
        reserved_at: 0,
      },
    ];
    let view = cart_view(&lines, 1_000, 0, "USD");

    assert!(view.text.contains("Total: <code>2.50 USD</code>"));
    assert_eq!(
      callbacks(&view)[0],
      vec!["dec:1", "prod:1", "inc:1", "rm:1"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
    );
    assert_eq!(callbacks(&view)[2], vec!["clear".to_string(), "checkout".to_string()]);
  }

  #[test]
  fn empty_cart_links_back_to_catalog() {
    let view = cart_view(&[], 0, 0, "USD");
    assert!(view.text.starts_with("Your cart is empty"));
    assert_eq!(callbacks(&view), vec![vec!["cats".to_string()]]);
  }

  #[test]
  fn orders_list_their_items() {
    let order = Order {
      order_id: 12,
      user_id: 1,
      total: 900,
      created_at: 0,
    };
    let text = orders_text(&[(order, vec![("Tea".to_string(), 450, 2)])], "USD");

    assert!(text.contains("<b>#12</b> - <code>9.00 USD</code>"));
    assert!(text.contains("Tea × 2 (4.50 USD)"));
    assert_eq!(orders_text(&[], "USD"), "You have no orders yet");
  }

  #[test]
  fn closed_ticket_can_only_be_reopened_by_user() {
    let ticket = Ticket {
      ticket_id: 5,
      user_id: 1,
      subject: "Order".into(),
      status: TicketStatus::Closed,
      created_at: 0,
      updated_at: 0,
    };

    assert_eq!(callbacks(&ticket_view(&ticket, &[], false)), vec![vec!["tk_op:5".to_string()]]);
    assert!(callbacks(&ticket_view(&ticket, &[], true)).is_empty());
  }

  #[test]
  fn admin_reply_button_differs() {
    let ticket = Ticket {
      ticket_id: 5,
      user_id: 1,
      subject: "Order".into(),
      status: TicketStatus::Open,
      created_at: 0,
      updated_at: 0,
    };

    assert_eq!(callbacks(&ticket_view(&ticket, &[], true))[0][0], "adm_reply:5");
    assert_eq!(callbacks(&ticket_view(&ticket, &[], false))[0][0], "tk_re:5");
  }
}
