use anyhow::{bail, Result};
use sqlx::{Executor, Sqlite};

use crate::{database::User, types::DbConn, util};

pub async fn ensure_user(db: &DbConn, user_id: i64, username: Option<String>) -> Result<()> {
  log::debug!("ensure_user for user_id: {:?} ({:?})", user_id, username);

  sqlx::query(
    "INSERT INTO users (user_id, username, balance, created_at) \
      VALUES ($1, $2, 0, $3) \
      ON CONFLICT (user_id) DO UPDATE SET username = $2",
  )
  .bind(user_id)
  .bind(username)
  .bind(util::get_unix())
  .execute(db)
  .await?;

  Ok(())
}

pub async fn get_user(db: &DbConn, user_id: i64) -> Result<Option<User>> {
  log::debug!("get_user for user_id: {:?}", user_id);

  let result: Option<User> = sqlx::query_as("SELECT * FROM users WHERE user_id = $1")
    .bind(user_id)
    .fetch_optional(db)
    .await?;

  log::debug!("get_user result: {:?}", result);

  Ok(result)
}

pub async fn get_balance(db: &DbConn, user_id: i64) -> Result<i64> {
  let result: Option<i64> = sqlx::query_scalar("SELECT balance FROM users WHERE user_id = $1")
    .bind(user_id)
    .fetch_optional(db)
    .await?;

  Ok(result.unwrap_or(0))
}

/// Adds `amount` (negative to debit) to a balance that must not drop below
/// zero. Takes any executor so it can run inside a caller's transaction.
pub async fn credit_balance<'e, E>(executor: E, user_id: i64, amount: i64) -> Result<i64>
where
  E: Executor<'e, Database = Sqlite>,
{
  log::debug!("credit_balance: {:?} for user_id: {:?}", amount, user_id);

  let result: Option<i64> = sqlx::query_scalar(
    "UPDATE users SET balance = balance + $1 \
      WHERE user_id = $2 AND balance + $1 >= 0 \
      RETURNING balance",
  )
  .bind(amount)
  .bind(user_id)
  .fetch_optional(executor)
  .await?;

  match result {
    Some(balance) => Ok(balance),
    None => bail!("Cannot change balance of user {} by {}", user_id, amount),
  }
}
