use anyhow::Result;

use crate::types::{ContentKey, DbConn};

// Falls back to the built-in text until an admin edits it
pub async fn get_content(db: &DbConn, key: ContentKey) -> Result<String> {
  log::debug!("get_content for key: {:?}", key);

  let result: Option<String> = sqlx::query_scalar("SELECT body FROM content WHERE content_key = $1")
    .bind(key.as_str())
    .fetch_optional(db)
    .await?;

  Ok(result.unwrap_or_else(|| key.default_body().to_string()))
}

pub async fn set_content(db: &DbConn, key: ContentKey, body: String) -> Result<()> {
  log::debug!("set_content for key: {:?}", key);

  sqlx::query(
    "INSERT INTO content (content_key, body) VALUES ($1, $2) \
      ON CONFLICT (content_key) DO UPDATE SET body = $2",
  )
  .bind(key.as_str())
  .bind(body)
  .execute(db)
  .await?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::test_pool;

  #[tokio::test]
  async fn edited_content_overrides_default() {
    let db = test_pool().await;

    assert_eq!(
      get_content(&db, ContentKey::Welcome).await.unwrap(),
      ContentKey::Welcome.default_body()
    );

    set_content(&db, ContentKey::Welcome, "Hi!".into()).await.unwrap();
    set_content(&db, ContentKey::Welcome, "Hello!".into()).await.unwrap();

    assert_eq!(get_content(&db, ContentKey::Welcome).await.unwrap(), "Hello!");
    assert_eq!(
      get_content(&db, ContentKey::Help).await.unwrap(),
      ContentKey::Help.default_body()
    );
  }
}
