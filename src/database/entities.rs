use serde::Serialize;

pub use crate::shop::TicketStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum TopupStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub balance: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Category {
    pub category_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Product {
    pub product_id: i64,
    pub category_id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
    pub reserved_at: i64,
}

impl CartLine {
    pub fn subtotal(&self) -> i64 {
        self.price * self.quantity
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Order {
    pub order_id: i64,
    pub user_id: i64,
    pub total: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Topup {
    pub topup_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: TopupStatus,
    pub created_at: i64,
    pub resolved_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Ticket {
    pub ticket_id: i64,
    pub user_id: i64,
    pub subject: String,
    pub status: TicketStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TicketMessage {
    pub message_id: i64,
    pub ticket_id: i64,
    pub from_admin: bool,
    pub body: String,
    pub created_at: i64,
}
