use crate::types::ContentKey;

/// Payload of an inline keyboard button. Encoded as short colon separated
/// strings to stay below Telegram's 64 byte limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackData {
  Categories,
  Category(i64),
  Product(i64),
  AddToCart(i64),

  Cart,
  CartIncrease(i64),
  CartDecrease(i64),
  CartRemove(i64),
  CartClear,
  Checkout,

  TopupApprove(i64),
  TopupReject(i64),

  Ticket(i64),
  TicketReply(i64),
  TicketClose(i64),
  TicketReopen(i64),

  AdminMenu,
  AdminCatalog,
  AdminAddCategory,
  AdminAddProduct(i64),
  AdminCategory(i64),
  AdminDeleteCategory(i64),
  AdminProduct(i64),
  AdminEditPrice(i64),
  AdminEditStock(i64),
  AdminDeleteProduct(i64),
  AdminTopups,
  AdminTickets,
  AdminReply(i64),
  AdminContent,
  AdminEditContent(ContentKey),
}

impl CallbackData {
  pub fn encode(&self) -> String {
    use CallbackData::*;

    match self {
      Categories => "cats".to_string(),
      Category(id) => format!("cat:{}", id),
      Product(id) => format!("prod:{}", id),
      AddToCart(id) => format!("add:{}", id),

      Cart => "cart".to_string(),
      CartIncrease(id) => format!("inc:{}", id),
      CartDecrease(id) => format!("dec:{}", id),
      CartRemove(id) => format!("rm:{}", id),
      CartClear => "clear".to_string(),
      Checkout => "checkout".to_string(),

      TopupApprove(id) => format!("tu_ok:{}", id),
      TopupReject(id) => format!("tu_no:{}", id),

      Ticket(id) => format!("tk:{}", id),
      TicketReply(id) => format!("tk_re:{}", id),
      TicketClose(id) => format!("tk_cl:{}", id),
      TicketReopen(id) => format!("tk_op:{}", id),

      AdminMenu => "adm".to_string(),
      AdminCatalog => "adm_catalog".to_string(),
      AdminAddCategory => "adm_addcat".to_string(),
      AdminAddProduct(id) => format!("adm_addprod:{}", id),
      AdminCategory(id) => format!("adm_cat:{}", id),
      AdminDeleteCategory(id) => format!("adm_delcat:{}", id),
      AdminProduct(id) => format!("adm_prod:{}", id),
      AdminEditPrice(id) => format!("adm_price:{}", id),
      AdminEditStock(id) => format!("adm_stock:{}", id),
      AdminDeleteProduct(id) => format!("adm_delprod:{}", id),
      AdminTopups => "adm_topups".to_string(),
      AdminTickets => "adm_tickets".to_string(),
      AdminReply(id) => format!("adm_reply:{}", id),
      AdminContent => "adm_content".to_string(),
      AdminEditContent(key) => format!("adm_text:{}", key.as_str()),
    }
  }

  pub fn parse(data: &str) -> Option<Self> {
    use CallbackData::*;

    let (tag, arg) = match data.split_once(':') {
      Some((tag, arg)) => (tag, Some(arg)),
      None => (data, None),
    };

    let id = || arg.and_then(|a| a.parse::<i64>().ok());

    let result = match (tag, arg) {
      ("cats", None) => Categories,
      ("cart", None) => Cart,
      ("clear", None) => CartClear,
      ("checkout", None) => Checkout,
      ("adm", None) => AdminMenu,
      ("adm_catalog", None) => AdminCatalog,
      ("adm_addcat", None) => AdminAddCategory,
      ("adm_topups", None) => AdminTopups,
      ("adm_tickets", None) => AdminTickets,
      ("adm_content", None) => AdminContent,
      ("adm_text", Some(key)) => AdminEditContent(ContentKey::parse(key)?),

      ("cat", _) => Category(id()?),
      ("prod", _) => Product(id()?),
      ("add", _) => AddToCart(id()?),
      ("inc", _) => CartIncrease(id()?),
      ("dec", _) => CartDecrease(id()?),
      ("rm", _) => CartRemove(id()?),
      ("tu_ok", _) => TopupApprove(id()?),
      ("tu_no", _) => TopupReject(id()?),
      ("tk", _) => Ticket(id()?),
      ("tk_re", _) => TicketReply(id()?),
      ("tk_cl", _) => TicketClose(id()?),
      ("tk_op", _) => TicketReopen(id()?),
      ("adm_addprod", _) => AdminAddProduct(id()?),
      ("adm_cat", _) => AdminCategory(id()?),
      ("adm_delcat", _) => AdminDeleteCategory(id()?),
      ("adm_prod", _) => AdminProduct(id()?),
      ("adm_price", _) => AdminEditPrice(id()?),
      ("adm_stock", _) => AdminEditStock(id()?),
      ("adm_delprod", _) => AdminDeleteProduct(id()?),
      ("adm_reply", _) => AdminReply(id()?),

      _ => return None,
    };

    Some(result)
  }

  pub fn is_admin_only(&self) -> bool {
    use CallbackData::*;

    matches!(
      self,
      TopupApprove(_)
        | TopupReject(_)
        | AdminMenu
        | AdminCatalog
        | AdminAddCategory
        | AdminAddProduct(_)
        | AdminCategory(_)
        | AdminDeleteCategory(_)
        | AdminProduct(_)
        | AdminEditPrice(_)
        | AdminEditStock(_)
        | AdminDeleteProduct(_)
        | AdminTopups
        | AdminTickets
        | AdminReply(_)
        | AdminContent
        | AdminEditContent(_)
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_known_payloads() {
    assert_eq!(CallbackData::parse("cats"), Some(CallbackData::Categories));
    assert_eq!(CallbackData::parse("inc:42"), Some(CallbackData::CartIncrease(42)));
    assert_eq!(
      CallbackData::parse("adm_text:help"),
      Some(CallbackData::AdminEditContent(ContentKey::Help))
    );
    assert_eq!(
      CallbackData::parse(&CallbackData::TicketReopen(7).encode()),
      Some(CallbackData::TicketReopen(7))
    );
  }

  #[test]
  fn rejects_malformed_payloads() {
    assert_eq!(CallbackData::parse(""), None);
    assert_eq!(CallbackData::parse("inc"), None);
    assert_eq!(CallbackData::parse("inc:x"), None);
    assert_eq!(CallbackData::parse("cart:1"), None);
    assert_eq!(CallbackData::parse("adm_text:nope"), None);
    assert_eq!(CallbackData::parse("unknown:1"), None);
  }

  #[test]
  fn payloads_fit_telegram_limit() {
    let longest = CallbackData::AdminDeleteProduct(i64::MAX).encode();
    assert!(longest.len() <= 64);
  }

  #[test]
  fn admin_actions_are_flagged() {
    assert!(CallbackData::TopupApprove(1).is_admin_only());
    assert!(!CallbackData::TicketClose(1).is_admin_only());
    assert!(!CallbackData::Checkout.is_admin_only());
  }
}
