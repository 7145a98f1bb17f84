#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStats {
  pub total_users: i64,
  pub total_products: i64,

  pub total_orders: i64,
  pub total_revenue: i64,

  pub active_tickets: i64,
  pub pending_topups: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutResult {
  pub order_id: i64,
  pub total: i64,
  pub balance: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TicketLimits {
  pub cooldown_ms: i64,
  pub max_open: i64,
}
