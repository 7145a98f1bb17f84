use anyhow::{bail, Result};
use thiserror::Error;

use crate::{
  database::{queries::credit_balance, Topup, TopupStatus},
  types::DbConn,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopupError {
  #[error("Top-up #{topup_id} was already handled")]
  NotPending { topup_id: i64 },
}

pub async fn create_topup(db: &DbConn, user_id: i64, amount: i64, now: i64) -> Result<i64> {
  log::debug!("create_topup: {:?} for user_id: {:?}", amount, user_id);

  if amount <= 0 {
    bail!("Top-up amount must be positive");
  }

  let topup_id: i64 = sqlx::query_scalar(
    "INSERT INTO topups (user_id, amount, status, created_at) \
      VALUES ($1, $2, $3, $4) RETURNING topup_id",
  )
  .bind(user_id)
  .bind(amount)
  .bind(TopupStatus::Pending)
  .bind(now)
  .fetch_one(db)
  .await?;

  Ok(topup_id)
}

pub async fn get_topup(db: &DbConn, topup_id: i64) -> Result<Option<Topup>> {
  let result: Option<Topup> = sqlx::query_as("SELECT * FROM topups WHERE topup_id = $1")
    .bind(topup_id)
    .fetch_optional(db)
    .await?;

  Ok(result)
}

pub async fn list_pending_topups(db: &DbConn) -> Result<Vec<Topup>> {
  log::debug!("list_pending_topups");

  let result: Vec<Topup> =
    sqlx::query_as("SELECT * FROM topups WHERE status = $1 ORDER BY created_at")
      .bind(TopupStatus::Pending)
      .fetch_all(db)
      .await?;

  Ok(result)
}

/// Moves a pending top-up to approved or rejected. Approving credits the
/// user's balance in the same transaction, a top-up is only ever resolved once.
pub async fn resolve_topup(
  db: &DbConn,
  topup_id: i64,
  approve: bool,
  now: i64,
) -> Result<Topup> {
  log::debug!("resolve_topup: {:?} approve: {:?}", topup_id, approve);

  let status = if approve {
    TopupStatus::Approved
  } else {
    TopupStatus::Rejected
  };

  let mut transaction = db.begin().await?;

  let topup: Option<Topup> = sqlx::query_as(
    "UPDATE topups SET status = $1, resolved_at = $2 \
      WHERE topup_id = $3 AND status = $4 RETURNING *",
  )
  .bind(status)
  .bind(now)
  .bind(topup_id)
  .bind(TopupStatus::Pending)
  .fetch_optional(transaction.as_mut())
  .await?;

  let Some(topup) = topup else {
    return Err(TopupError::NotPending { topup_id }.into());
  };

  if approve {
    credit_balance(transaction.as_mut(), topup.user_id, topup.amount).await?;
  }

  transaction.commit().await?;

  log::info!(
    "Top-up {} of {} for {} resolved as {:?}",
    topup.topup_id,
    topup.amount,
    topup.user_id,
    topup.status
  );

  Ok(topup)
}
