use anyhow::{bail, Result};
use sqlx::{Sqlite, Transaction};

use crate::{
  database::{queries::TicketLimits, Ticket, TicketMessage, TicketStatus},
  shop::{self, TicketError, TicketEvent},
  types::DbConn,
};

async fn count_open_tickets(transaction: &mut Transaction<'_, Sqlite>, user_id: i64) -> Result<i64> {
  let open_count: i64 =
    sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE user_id = $1 AND status != $2")
      .bind(user_id)
      .bind(TicketStatus::Closed)
      .fetch_one(transaction.as_mut())
      .await?;

  Ok(open_count)
}

async fn fetch_ticket(transaction: &mut Transaction<'_, Sqlite>, ticket_id: i64) -> Result<Ticket> {
  let ticket: Option<Ticket> = sqlx::query_as("SELECT * FROM tickets WHERE ticket_id = $1")
    .bind(ticket_id)
    .fetch_optional(transaction.as_mut())
    .await?;

  match ticket {
    Some(ticket) => Ok(ticket),
    None => bail!("Ticket {} does not exist", ticket_id),
  }
}

async fn check_ticket_limits(
  transaction: &mut Transaction<'_, Sqlite>,
  user_id: i64,
  limits: TicketLimits,
  now: i64,
) -> Result<()> {
  let last_created_at: Option<i64> =
    sqlx::query_scalar("SELECT MAX(created_at) FROM tickets WHERE user_id = $1")
      .bind(user_id)
      .fetch_one(transaction.as_mut())
      .await?;
  let open_count = count_open_tickets(transaction, user_id).await?;

  shop::check_rate_limit(
    last_created_at.unwrap_or(0),
    open_count,
    now,
    limits.cooldown_ms,
    limits.max_open,
  )?;

  Ok(())
}

/// Checks the ticket limits up front, so users are not asked to write a
/// message that would be refused anyway.
pub async fn can_open_ticket(
  db: &DbConn,
  user_id: i64,
  limits: TicketLimits,
  now: i64,
) -> Result<()> {
  let mut transaction = db.begin().await?;
  check_ticket_limits(&mut transaction, user_id, limits, now).await?;
  transaction.rollback().await?;
  Ok(())
}

/// Opens a ticket with its first message. Fails with a [`TicketError`] when
/// the user has too many active tickets or opened one too recently.
pub async fn create_ticket(
  db: &DbConn,
  user_id: i64,
  subject: String,
  body: String,
  limits: TicketLimits,
  now: i64,
) -> Result<i64> {
  log::debug!("create_ticket: {:?} for user_id: {:?}", subject, user_id);

  let mut transaction = db.begin().await?;

  check_ticket_limits(&mut transaction, user_id, limits, now).await?;

  let ticket_id: i64 = sqlx::query_scalar(
    "INSERT INTO tickets (user_id, subject, status, created_at, updated_at) \
      VALUES ($1, $2, $3, $4, $4) RETURNING ticket_id",
  )
  .bind(user_id)
  .bind(subject)
  .bind(TicketStatus::Open)
  .bind(now)
  .fetch_one(transaction.as_mut())
  .await?;

  sqlx::query(
    "INSERT INTO ticket_messages (ticket_id, from_admin, body, created_at) \
      VALUES ($1, FALSE, $2, $3)",
  )
  .bind(ticket_id)
  .bind(body)
  .bind(now)
  .execute(transaction.as_mut())
  .await?;

  transaction.commit().await?;

  log::info!("Ticket {} opened by {}", ticket_id, user_id);

  Ok(ticket_id)
}

pub async fn get_ticket(db: &DbConn, ticket_id: i64) -> Result<Option<Ticket>> {
  let result: Option<Ticket> = sqlx::query_as("SELECT * FROM tickets WHERE ticket_id = $1")
    .bind(ticket_id)
    .fetch_optional(db)
    .await?;

  Ok(result)
}

pub async fn list_user_tickets(db: &DbConn, user_id: i64) -> Result<Vec<Ticket>> {
  log::debug!("list_user_tickets for user_id: {:?}", user_id);

  let result: Vec<Ticket> = sqlx::query_as(
    "SELECT * FROM tickets WHERE user_id = $1 \
      ORDER BY updated_at DESC, ticket_id DESC LIMIT 20",
  )
  .bind(user_id)
  .fetch_all(db)
  .await?;

  Ok(result)
}

// Tickets waiting on staff come first
pub async fn list_active_tickets(db: &DbConn) -> Result<Vec<Ticket>> {
  log::debug!("list_active_tickets");

  let result: Vec<Ticket> = sqlx::query_as(
    "SELECT * FROM tickets WHERE status != $1 \
      ORDER BY status = $2, updated_at LIMIT 50",
  )
  .bind(TicketStatus::Closed)
  .bind(TicketStatus::Answered)
  .fetch_all(db)
  .await?;

  Ok(result)
}

pub async fn get_ticket_messages(db: &DbConn, ticket_id: i64) -> Result<Vec<TicketMessage>> {
  let result: Vec<TicketMessage> = sqlx::query_as(
    "SELECT * FROM ticket_messages WHERE ticket_id = $1 ORDER BY created_at, message_id",
  )
  .bind(ticket_id)
  .fetch_all(db)
  .await?;

  Ok(result)
}

/// Appends a message to a ticket and moves it through the state machine.
/// Messages on a closed ticket are refused.
pub async fn add_ticket_message(
  db: &DbConn,
  ticket_id: i64,
  from_admin: bool,
  body: String,
  now: i64,
) -> Result<Ticket> {
  log::debug!(
    "add_ticket_message to ticket_id: {:?} from_admin: {:?}",
    ticket_id,
    from_admin
  );

  let event = if from_admin {
    TicketEvent::AdminReply
  } else {
    TicketEvent::UserMessage
  };

  let mut transaction = db.begin().await?;

  let ticket = fetch_ticket(&mut transaction, ticket_id).await?;
  let status = ticket.status.apply(event)?;

  sqlx::query(
    "INSERT INTO ticket_messages (ticket_id, from_admin, body, created_at) \
      VALUES ($1, $2, $3, $4)",
  )
  .bind(ticket_id)
  .bind(from_admin)
  .bind(body)
  .bind(now)
  .execute(transaction.as_mut())
  .await?;

  sqlx::query("UPDATE tickets SET status = $1, updated_at = $2 WHERE ticket_id = $3")
    .bind(status)
    .bind(now)
    .bind(ticket_id)
    .execute(transaction.as_mut())
    .await?;

  transaction.commit().await?;

  Ok(Ticket {
    status,
    updated_at: now,
    ..ticket
  })
}

pub async fn close_ticket(db: &DbConn, ticket_id: i64, now: i64) -> Result<Ticket> {
  log::debug!("close_ticket: {:?}", ticket_id);

  let mut transaction = db.begin().await?;

  let ticket = fetch_ticket(&mut transaction, ticket_id).await?;
  let status = ticket.status.apply(TicketEvent::Close)?;

  sqlx::query("UPDATE tickets SET status = $1, updated_at = $2 WHERE ticket_id = $3")
    .bind(status)
    .bind(now)
    .bind(ticket_id)
    .execute(transaction.as_mut())
    .await?;

  transaction.commit().await?;

  Ok(Ticket {
    status,
    updated_at: now,
    ..ticket
  })
}

// A reopened ticket counts towards the open ticket limit again
pub async fn reopen_ticket(
  db: &DbConn,
  ticket_id: i64,
  limits: TicketLimits,
  now: i64,
) -> Result<Ticket> {
  log::debug!("reopen_ticket: {:?}", ticket_id);

  let mut transaction = db.begin().await?;

  let ticket = fetch_ticket(&mut transaction, ticket_id).await?;
  let status = ticket.status.apply(TicketEvent::Reopen)?;

  let open_count = count_open_tickets(&mut transaction, ticket.user_id).await?;
  if open_count >= limits.max_open {
    return Err(
      TicketError::TooManyOpen {
        max: limits.max_open,
      }
      .into(),
    );
  }

  sqlx::query("UPDATE tickets SET status = $1, updated_at = $2 WHERE ticket_id = $3")
    .bind(status)
    .bind(now)
    .bind(ticket_id)
    .execute(transaction.as_mut())
    .await?;

  transaction.commit().await?;

  Ok(Ticket {
    status,
    updated_at: now,
    ..ticket
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::{queries::ensure_user, test_pool};

  const LIMITS: TicketLimits = TicketLimits {
    cooldown_ms: 60_000,
    max_open: 2,
  };

  #[tokio::test]
  async fn cooldown_applies_between_tickets() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();

    create_ticket(&db, 1, "a".into(), "help".into(), LIMITS, 1_000)
      .await
      .unwrap();
    assert!(can_open_ticket(&db, 1, LIMITS, 30_000).await.is_err());
    assert!(can_open_ticket(&db, 2, LIMITS, 30_000).await.is_ok());

    let err = create_ticket(&db, 1, "b".into(), "help".into(), LIMITS, 30_000)
      .await
      .unwrap_err();
    assert_eq!(
      err.downcast_ref::<TicketError>(),
      Some(&TicketError::Cooldown { retry_at: 61_000 })
    );

    create_ticket(&db, 1, "b".into(), "help".into(), LIMITS, 61_000)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn open_ticket_limit() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();

    let first = create_ticket(&db, 1, "a".into(), "x".into(), LIMITS, 1_000)
      .await
      .unwrap();
    create_ticket(&db, 1, "b".into(), "x".into(), LIMITS, 100_000)
      .await
      .unwrap();

    let err = create_ticket(&db, 1, "c".into(), "x".into(), LIMITS, 200_000)
      .await
      .unwrap_err();
    assert_eq!(
      err.downcast_ref::<TicketError>(),
      Some(&TicketError::TooManyOpen { max: 2 })
    );

    close_ticket(&db, first, 250_000).await.unwrap();
    create_ticket(&db, 1, "c".into(), "x".into(), LIMITS, 300_000)
      .await
      .unwrap();

    let err = reopen_ticket(&db, first, LIMITS, 400_000).await.unwrap_err();
    assert!(err.downcast_ref::<TicketError>().is_some());
  }

  #[tokio::test]
  async fn conversation_moves_status() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();

    let ticket_id = create_ticket(&db, 1, "a".into(), "first".into(), LIMITS, 1_000)
      .await
      .unwrap();

    let ticket = add_ticket_message(&db, ticket_id, true, "reply".into(), 2_000)
      .await
      .unwrap();
    assert_eq!(ticket.status, TicketStatus::Answered);

    let ticket = add_ticket_message(&db, ticket_id, false, "thanks".into(), 3_000)
      .await
      .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);

    let ticket = close_ticket(&db, ticket_id, 4_000).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Closed);

    assert!(
      add_ticket_message(&db, ticket_id, false, "more".into(), 5_000)
        .await
        .is_err()
    );

    let messages = get_ticket_messages(&db, ticket_id).await.unwrap();
    assert_eq!(
      messages.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
      vec!["first", "reply", "thanks"]
    );
    assert!(messages[1].from_admin);

    let ticket = reopen_ticket(&db, ticket_id, LIMITS, 6_000).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(
      get_ticket(&db, ticket_id).await.unwrap().unwrap().status,
      TicketStatus::Open
    );
  }

  #[tokio::test]
  async fn active_tickets_waiting_first() {
    let db = test_pool().await;
    ensure_user(&db, 1, None).await.unwrap();
    ensure_user(&db, 2, None).await.unwrap();

    let answered = create_ticket(&db, 1, "a".into(), "x".into(), LIMITS, 1_000)
      .await
      .unwrap();
    let waiting = create_ticket(&db, 2, "b".into(), "x".into(), LIMITS, 2_000)
      .await
      .unwrap();
    add_ticket_message(&db, answered, true, "done".into(), 3_000)
      .await
      .unwrap();

    let active = list_active_tickets(&db).await.unwrap();
    assert_eq!(
      active.iter().map(|t| t.ticket_id).collect::<Vec<_>>(),
      vec![waiting, answered]
    );
  }
}
